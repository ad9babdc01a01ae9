use crate::models::audio_models::PcmFrameBatch;
use crate::models::error::CaptureError;

/// Metadata of one acquired native packet.
#[derive(Debug, Clone, Copy)]
pub struct RawPacket {
    pub frame_count: u32,
    /// The native stack flagged this packet as silence; its buffer contents
    /// are undefined and must not be read.
    pub silent: bool,
}

/// Low-level packet access against a native capture interface.
///
/// [`drain_packets`] drives this in the strict order the native protocol
/// requires: `next_packet_size` → `acquire` → `copy_samples` → `release`,
/// repeated until the pending size reports zero. Splitting the protocol out
/// of `pull()` keeps the drain algorithm in one place, shared between the
/// platform session and instrumented test doubles.
pub trait PacketSource {
    /// Channels per frame for the open stream.
    fn channel_count(&self) -> u16;

    /// Frames in the next pending packet; zero when the queue is empty.
    fn next_packet_size(&mut self) -> Result<u32, CaptureError>;

    /// Lock the next packet's buffer and report its metadata.
    fn acquire(&mut self) -> Result<RawPacket, CaptureError>;

    /// Copy `frame_count * channel_count` samples out of the acquired
    /// buffer into `out`.
    ///
    /// May fail with [`CaptureError::BufferAccessViolation`] when the
    /// native buffer is unreadable; the packet must still be released.
    fn copy_samples(&mut self, frame_count: u32, out: &mut Vec<f32>) -> Result<(), CaptureError>;

    /// Release the acquired buffer.
    ///
    /// Must be called with the same frame count the packet was acquired
    /// with, including zero, regardless of whether the copy succeeded.
    fn release(&mut self, frame_count: u32) -> Result<(), CaptureError>;
}

/// Drain every pending packet from `source` into owned frame batches.
///
/// - Zero-frame packets are released (with frame count 0) and produce no
///   batch.
/// - Silent-flagged packets produce a zeroed batch of the same shape
///   without touching the native buffer.
/// - A copy failure drops that one batch, releases the buffer and keeps
///   servicing the remaining packets.
pub fn drain_packets<S: PacketSource>(source: &mut S) -> Result<Vec<PcmFrameBatch>, CaptureError> {
    let channels = source.channel_count();
    let mut batches = Vec::new();

    loop {
        let pending = source.next_packet_size()?;
        if pending == 0 {
            break;
        }

        let packet = source.acquire()?;
        if packet.frame_count > 0 {
            let sample_count = packet.frame_count as usize * channels as usize;
            if packet.silent {
                batches.push(PcmFrameBatch {
                    samples: vec![0.0; sample_count],
                    channel_count: channels,
                    frame_count: packet.frame_count as usize,
                });
            } else {
                let mut samples = Vec::with_capacity(sample_count);
                match source.copy_samples(packet.frame_count, &mut samples) {
                    Ok(()) => batches.push(PcmFrameBatch {
                        samples,
                        channel_count: channels,
                        frame_count: packet.frame_count as usize,
                    }),
                    Err(CaptureError::BufferAccessViolation) => {
                        log::warn!(
                            "dropping batch of {} frames: access violation reading native buffer",
                            packet.frame_count
                        );
                    }
                    Err(e) => {
                        // Non-recoverable, but the native buffer must not
                        // stay locked on the way out.
                        let _ = source.release(packet.frame_count);
                        return Err(e);
                    }
                }
            }
        } else {
            log::debug!("skipping zero-frame packet");
        }

        source.release(packet.frame_count)?;
    }

    Ok(batches)
}

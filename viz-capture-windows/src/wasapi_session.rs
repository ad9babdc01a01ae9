//! One open WASAPI stream: format negotiation, the packet-pull protocol
//! and handle teardown.
//!
//! Shared mode only. Loopback streams are initialized against a render
//! endpoint with `AUDCLNT_STREAMFLAGS_LOOPBACK`; the mix format is accepted
//! only when it is IEEE-float PCM, either directly or through an extensible
//! wrapper whose sub-format GUID identifies IEEE float.

use std::ffi::c_void;

use viz_capture_core::{
    drain_packets, CaptureError, EndpointSession, NegotiatedFormat, PacketSource, PcmFrameBatch,
    RawPacket, SampleEncoding,
};
use windows::core::GUID;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

const WAVE_FORMAT_PCM_TAG: u16 = 0x0001;
const WAVE_FORMAT_IEEE_FLOAT_TAG: u16 = 0x0003;
const WAVE_FORMAT_EXTENSIBLE_TAG: u16 = 0xFFFE;

// {00000003-0000-0010-8000-00AA00389B71}
const KSDATAFORMAT_SUBTYPE_IEEE_FLOAT: GUID =
    GUID::from_u128(0x00000003_0000_0010_8000_00aa00389b71);

/// Requested buffer duration, in 100 ns units.
const REFERENCE_TIME_1SEC: i64 = 10_000_000;

/// An acquired-but-unreleased native packet buffer.
struct PendingBuffer {
    data: *const u8,
}

/// One open WASAPI capture stream against one endpoint.
///
/// Owns the `IAudioClient` and `IAudioCaptureClient` pair; both are valid
/// while open and both are dropped by `close()`. Confined to the capture
/// thread, like everything COM in this crate.
pub struct WasapiSession {
    client: Option<IAudioClient>,
    capture: Option<IAudioCaptureClient>,
    format: NegotiatedFormat,
    pending: Option<PendingBuffer>,
}

impl WasapiSession {
    /// Open a stream against `device`, in strict order: activate → query
    /// mix format → classify → initialize → fetch capture interface →
    /// start. On any failure every partially-acquired interface is
    /// released before returning.
    pub fn open(device: &IMMDevice, loopback: bool) -> Result<Self, CaptureError> {
        unsafe {
            let client: IAudioClient = device
                .Activate(CLSCTX_ALL, None)
                .map_err(|e| CaptureError::Unknown(format!("Activate failed: {}", e)))?;

            let mix_format_ptr = client
                .GetMixFormat()
                .map_err(|e| CaptureError::Unknown(format!("GetMixFormat failed: {}", e)))?;

            // Classify before Initialize; an unsupported mix format must
            // not touch the stream at all.
            let format = classify_mix_format(mix_format_ptr);
            let init_result = match &format {
                Ok(_) => client.Initialize(
                    AUDCLNT_SHAREMODE_SHARED,
                    if loopback { AUDCLNT_STREAMFLAGS_LOOPBACK } else { 0 },
                    REFERENCE_TIME_1SEC,
                    0,
                    mix_format_ptr,
                    None,
                ),
                Err(_) => Ok(()),
            };
            CoTaskMemFree(Some(mix_format_ptr as *const _ as *const c_void));

            let format = format?;
            init_result.map_err(|e| CaptureError::NativeInitFailed { status: e.code().0 })?;

            let capture: IAudioCaptureClient = client
                .GetService()
                .map_err(|e| CaptureError::Unknown(format!("GetService failed: {}", e)))?;

            client
                .Start()
                .map_err(|e| CaptureError::NativeInitFailed { status: e.code().0 })?;

            log::info!(
                "initialized audio client: {} Hz, {} channels (loopback: {})",
                format.sample_rate,
                format.channel_count,
                loopback
            );

            Ok(Self {
                client: Some(client),
                capture: Some(capture),
                format,
                pending: None,
            })
        }
    }

    fn capture_client(&self) -> Result<&IAudioCaptureClient, CaptureError> {
        self.capture
            .as_ref()
            .ok_or_else(|| CaptureError::Unknown("session is closed".into()))
    }
}

impl PacketSource for WasapiSession {
    fn channel_count(&self) -> u16 {
        self.format.channel_count
    }

    fn next_packet_size(&mut self) -> Result<u32, CaptureError> {
        let capture = self.capture_client()?;
        unsafe {
            capture
                .GetNextPacketSize()
                .map_err(|e| CaptureError::Unknown(format!("GetNextPacketSize failed: {}", e)))
        }
    }

    fn acquire(&mut self) -> Result<RawPacket, CaptureError> {
        let capture = self.capture_client()?;

        let mut data: *mut u8 = std::ptr::null_mut();
        let mut frame_count: u32 = 0;
        let mut flags: u32 = 0;
        unsafe {
            capture
                .GetBuffer(&mut data, &mut frame_count, &mut flags, None, None)
                .map_err(|e| CaptureError::Unknown(format!("GetBuffer failed: {}", e)))?;
        }

        self.pending = Some(PendingBuffer { data });
        Ok(RawPacket {
            frame_count,
            silent: flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0,
        })
    }

    fn copy_samples(&mut self, frame_count: u32, out: &mut Vec<f32>) -> Result<(), CaptureError> {
        let pending = self
            .pending
            .as_ref()
            .ok_or_else(|| CaptureError::Unknown("no acquired packet".into()))?;

        if pending.data.is_null() {
            return Err(CaptureError::BufferAccessViolation);
        }

        let sample_count = frame_count as usize * self.format.channel_count as usize;
        unsafe {
            let samples = std::slice::from_raw_parts(pending.data as *const f32, sample_count);
            out.extend_from_slice(samples);
        }
        Ok(())
    }

    fn release(&mut self, frame_count: u32) -> Result<(), CaptureError> {
        self.pending = None;
        let capture = self.capture_client()?;
        unsafe {
            capture
                .ReleaseBuffer(frame_count)
                .map_err(|e| CaptureError::Unknown(format!("ReleaseBuffer failed: {}", e)))
        }
    }
}

impl EndpointSession for WasapiSession {
    fn format(&self) -> NegotiatedFormat {
        self.format
    }

    fn pull(&mut self) -> Result<Vec<PcmFrameBatch>, CaptureError> {
        drain_packets(self)
    }

    fn close(&mut self) {
        self.pending = None;
        self.capture = None;
        if let Some(client) = self.client.take() {
            unsafe {
                let _ = client.Stop();
            }
        }
    }
}

impl Drop for WasapiSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Classify an endpoint's mix format.
///
/// Only IEEE-float PCM is accepted — directly tagged, or wrapped in an
/// extensible format whose `SubFormat` GUID identifies IEEE float. Integer
/// PCM and anything else is rejected with the tag and bit depth preserved
/// for diagnostics.
///
/// # Safety
/// `pwfx` must point to a valid `WAVEFORMATEX` (followed by the extensible
/// tail when so tagged), as returned by `IAudioClient::GetMixFormat`.
unsafe fn classify_mix_format(pwfx: *const WAVEFORMATEX) -> Result<NegotiatedFormat, CaptureError> {
    let fmt = &*pwfx;

    let encoding = match fmt.wFormatTag {
        WAVE_FORMAT_IEEE_FLOAT_TAG => SampleEncoding::IeeeFloat,
        WAVE_FORMAT_EXTENSIBLE_TAG => {
            let ext = &*(pwfx as *const WAVEFORMATEXTENSIBLE);
            if ext.SubFormat == KSDATAFORMAT_SUBTYPE_IEEE_FLOAT {
                SampleEncoding::IeeeFloat
            } else {
                SampleEncoding::PcmInt
            }
        }
        WAVE_FORMAT_PCM_TAG => SampleEncoding::PcmInt,
        _ => {
            return Err(CaptureError::UnsupportedFormat {
                format_tag: fmt.wFormatTag,
                bits_per_sample: fmt.wBitsPerSample,
            })
        }
    };

    if encoding != SampleEncoding::IeeeFloat {
        return Err(CaptureError::UnsupportedFormat {
            format_tag: fmt.wFormatTag,
            bits_per_sample: fmt.wBitsPerSample,
        });
    }

    Ok(NegotiatedFormat {
        sample_rate: fmt.nSamplesPerSec,
        channel_count: fmt.nChannels,
        bits_per_sample: fmt.wBitsPerSample,
        sample_encoding: encoding,
    })
}

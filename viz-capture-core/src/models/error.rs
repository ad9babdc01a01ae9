use thiserror::Error;

/// Errors raised by the capture engine and its platform backends.
///
/// None of these are fatal to the host process: every failure degrades to
/// "no audio currently flowing" while the visualization consumer keeps
/// rendering. Re-entry after a failed open requires an explicit `start()`
/// or `select_device()` from the control surface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The OS endpoint enumeration call failed outright.
    #[error("device enumeration failed: {0}")]
    EnumerationFailed(String),

    /// The endpoint's mix format is not IEEE-float PCM.
    #[error("unsupported mix format: tag {format_tag:#06x}, {bits_per_sample} bits per sample")]
    UnsupportedFormat {
        format_tag: u16,
        bits_per_sample: u16,
    },

    /// The native stream refused to initialize or start.
    #[error("native stream init failed with status {status:#010x}")]
    NativeInitFailed { status: i32 },

    /// A native packet buffer could not be read. The batch is dropped.
    #[error("access violation reading native audio buffer")]
    BufferAccessViolation,

    /// The selected ordinal no longer resolves against the current snapshot.
    #[error("device at ordinal {0} vanished")]
    DeviceVanished(i32),

    /// Backend failure with no more specific mapping.
    #[error("unknown error: {0}")]
    Unknown(String),
}

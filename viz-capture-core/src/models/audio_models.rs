use serde::{Deserialize, Serialize};

/// Ordinal reserved for the synthetic "system default output, loopback" entry.
pub const DEFAULT_ORDINAL: i32 = -1;

/// Display name of the synthetic default entry.
pub const DEFAULT_DEVICE_NAME: &str = "Default Loopback";

/// Data-flow direction of an audio endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFlow {
    /// Output endpoint (speakers, headphones). Captured via loopback.
    Render,
    /// Input endpoint (microphone).
    Capture,
}

/// A raw endpoint as reported by the platform backend, before ordinals
/// are assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointInfo {
    pub display_name: String,
    pub direction: DataFlow,
}

/// One enumerated device, valid for the lifetime of a single snapshot.
///
/// Ordinals are stable only within the snapshot that produced them; the
/// next enumeration may hand the same device a different ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub ordinal: i32,
    pub display_name: String,
    pub direction: DataFlow,
}

impl DeviceDescriptor {
    /// The synthetic entry for the default render endpoint in loopback mode.
    pub fn default_loopback() -> Self {
        Self {
            ordinal: DEFAULT_ORDINAL,
            display_name: DEFAULT_DEVICE_NAME.into(),
            direction: DataFlow::Render,
        }
    }

    /// Whether this target must be opened with the loopback flag set.
    ///
    /// True for every render endpoint and for the synthetic default entry;
    /// capture endpoints are opened as plain input streams.
    pub fn wants_loopback(&self) -> bool {
        self.ordinal == DEFAULT_ORDINAL || self.direction == DataFlow::Render
    }
}

/// Sample encoding negotiated with the OS audio stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleEncoding {
    IeeeFloat,
    PcmInt,
}

/// The stream format accepted when a session opened.
///
/// Immutable for that session's lifetime and invalidated when it closes.
/// The consumer adapts to whatever is reported here; the engine performs
/// no resampling or channel remixing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiatedFormat {
    pub sample_rate: u32,
    pub channel_count: u16,
    pub bits_per_sample: u16,
    pub sample_encoding: SampleEncoding,
}

/// One packet's worth of interleaved float samples.
///
/// Ephemeral: produced per native packet and handed synchronously to the
/// PCM sink, never retained by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmFrameBatch {
    pub samples: Vec<f32>,
    pub channel_count: u16,
    pub frame_count: usize,
}

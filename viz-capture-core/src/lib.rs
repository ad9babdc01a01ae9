//! # viz-capture-core
//!
//! Platform-agnostic live audio capture engine.
//!
//! Continuously pulls floating-point PCM packets from an OS audio endpoint
//! — a microphone or a loopback tap of system output — and hands them to a
//! downstream visualization consumer. Device switches, vanished devices and
//! transient negotiation failures are absorbed without restarting the host
//! process: every failure degrades to "no audio flowing", never to a crash.
//!
//! Platform backends (Windows WASAPI in `viz-capture-windows`) implement
//! the `CaptureBackend`/`EndpointSession` traits and plug into the generic
//! engine.
//!
//! ## Architecture
//!
//! ```text
//! viz-capture-core (this crate)
//! ├── traits/       ← CaptureBackend, EndpointSession, PacketSource, PcmSinkCallback
//! ├── models/       ← DeviceDescriptor, NegotiatedFormat, PcmFrameBatch, CaptureError, EngineState
//! └── session/      ← DeviceSnapshot, ControlState, CaptureEngine, ControlSurface
//! ```
//!
//! One dedicated thread runs the engine state machine
//! (idle → selecting → streaming → draining) and owns every native handle;
//! the [`ControlSurface`] mutates shared atomic control flags from any
//! thread, and the engine observes them at its next poll point.

pub mod models;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::audio_models::{
    DataFlow, DeviceDescriptor, EndpointInfo, NegotiatedFormat, PcmFrameBatch, SampleEncoding,
    DEFAULT_DEVICE_NAME, DEFAULT_ORDINAL,
};
pub use models::error::CaptureError;
pub use models::state::EngineState;
pub use session::registry::{next_ordinal, DeviceSnapshot};
pub use session::surface::ControlSurface;
pub use traits::backend::{CaptureBackend, EndpointSession};
pub use traits::packet_source::{drain_packets, PacketSource, RawPacket};
pub use traits::pcm_sink::PcmSinkCallback;

//! # viz-capture-windows
//!
//! Windows WASAPI backend for viz-capture.
//!
//! Provides:
//! - `WasapiBackend` — endpoint enumeration and session opening, one
//!   instance per capture thread
//! - `WasapiSession` — one open `IAudioClient`/`IAudioCaptureClient` pair
//! - `DeviceEnumerator` — MMDevice API enumeration with friendly names
//!
//! Loopback capture of the default output needs no special permissions on
//! Windows; DRM-protected audio arrives silenced.
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use viz_capture_windows::spawn_capture;
//!
//! let surface = spawn_capture(Arc::new(|samples, channels| {
//!     visualizer.add_pcm(samples, channels);
//! }))?;
//! surface.start(-1); // default output, loopback
//! ```

#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod wasapi_backend;
#[cfg(target_os = "windows")]
pub mod wasapi_session;

#[cfg(target_os = "windows")]
pub use device_enumerator::DeviceEnumerator;
#[cfg(target_os = "windows")]
pub use wasapi_backend::WasapiBackend;
#[cfg(target_os = "windows")]
pub use wasapi_session::WasapiSession;

#[cfg(target_os = "windows")]
use viz_capture_core::{CaptureError, ControlSurface, PcmSinkCallback};

/// Spawn a capture engine backed by WASAPI.
///
/// The backend (and its COM apartment) is created on the capture thread.
/// The engine starts idle; call `start()` on the returned surface.
#[cfg(target_os = "windows")]
pub fn spawn_capture(sink: PcmSinkCallback) -> Result<ControlSurface, CaptureError> {
    ControlSurface::spawn(WasapiBackend::new, sink)
}

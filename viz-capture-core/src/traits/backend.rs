use crate::models::audio_models::{DeviceDescriptor, EndpointInfo, NegotiatedFormat, PcmFrameBatch};
use crate::models::error::CaptureError;

/// Platform hook for endpoint enumeration and stream opening.
///
/// One backend instance lives on the capture thread for that thread's whole
/// lifetime and is never touched from anywhere else, so implementations may
/// hold thread-affine COM-style interfaces without locking. Backends are
/// constructed *on* the capture thread via the factory passed to
/// [`ControlSurface::spawn`](crate::session::surface::ControlSurface::spawn).
pub trait CaptureBackend: 'static {
    type Session: EndpointSession;

    /// List the endpoints currently in the active state, real devices only.
    ///
    /// This is a pure query: it must not activate or otherwise mutate any
    /// endpoint. The synthetic default entry is added by the registry, not
    /// here. Endpoints are reported in a stable order so that the ordinal a
    /// caller selects resolves against the same listing.
    fn list_endpoints(&mut self) -> Result<Vec<EndpointInfo>, CaptureError>;

    /// Open a native stream against `target`, negotiated from its mix format.
    ///
    /// `loopback` requests capture of the endpoint's rendered output. On
    /// failure no native handle may remain open; partially-acquired handles
    /// are released before the error is returned.
    fn open_session(
        &mut self,
        target: &DeviceDescriptor,
        loopback: bool,
    ) -> Result<Self::Session, CaptureError>;
}

/// An open native stream against one endpoint.
///
/// Owns exactly one audio-client handle and one capture-interface handle;
/// both are valid while the session is open and both are released by
/// `close()`. Only the capture thread ever calls into a session.
pub trait EndpointSession {
    /// The format negotiated when this session opened.
    fn format(&self) -> NegotiatedFormat;

    /// Drain every packet the endpoint has pending.
    ///
    /// Returns an empty vec when nothing is queued; the caller sleeps
    /// briefly in that case rather than spinning. A returned error is
    /// non-recoverable for this session and sends the engine to draining.
    fn pull(&mut self) -> Result<Vec<PcmFrameBatch>, CaptureError>;

    /// Release both native handles. Idempotent.
    fn close(&mut self);
}

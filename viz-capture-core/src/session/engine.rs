use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::models::state::EngineState;
use crate::session::control::EngineShared;
use crate::session::registry::DeviceSnapshot;
use crate::traits::backend::{CaptureBackend, EndpointSession};
use crate::traits::pcm_sink::PcmSinkCallback;

/// Poll interval while parked with capture disabled.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Sleep between pulls when the endpoint had no packets pending.
const PULL_IDLE: Duration = Duration::from_millis(10);

/// The capture state machine, run to completion on a dedicated thread.
///
/// Owns the platform backend and the zero-or-one active session; all
/// native handles live and die on this thread. Control-plane requests
/// arrive through the shared atomic flags and are observed at the next
/// poll point — stopping is cooperative, bounded by the poll interval,
/// never instantaneous.
pub(crate) struct CaptureEngine<B: CaptureBackend> {
    backend: B,
    shared: Arc<EngineShared>,
    sink: PcmSinkCallback,
}

impl<B: CaptureBackend> CaptureEngine<B> {
    pub(crate) fn new(backend: B, shared: Arc<EngineShared>, sink: PcmSinkCallback) -> Self {
        Self {
            backend,
            shared,
            sink,
        }
    }

    /// Run until shutdown is requested.
    pub(crate) fn run(mut self) {
        log::info!("capture thread started");

        // Publish an initial snapshot so device queries work before the
        // first start() call, and log what is selectable.
        let snapshot = DeviceSnapshot::capture(&mut self.backend);
        log::info!("available audio capturing devices:");
        for (ordinal, name) in snapshot.names() {
            log::info!(" - {}: {}", ordinal, name);
        }
        self.shared.publish_devices(snapshot);

        while !self.shared.control.shutdown_requested() {
            if !self.shared.control.capture_enabled() {
                self.shared.set_state(EngineState::Idle);
                thread::sleep(IDLE_POLL);
                continue;
            }
            self.cycle();
        }

        self.shared.set_state(EngineState::Idle);
        log::info!("capture thread exited");
    }

    /// One selecting → streaming → draining pass.
    ///
    /// Returns with the session fully closed on every path. When this
    /// leaves `capture_enabled` untouched the outer loop re-enters
    /// selection (the device-switch path); when capture was disabled, or a
    /// selection failure forced it off, the outer loop parks in idle.
    fn cycle(&mut self) {
        self.shared.set_state(EngineState::Selecting);

        // A stop may have landed between the enable check in run() and the
        // state transition above; its bounded wait can have observed the
        // still-published idle state and returned already. Re-check before
        // touching any device so no session opens after a stop() returned.
        if !self.shared.control.capture_enabled() {
            return;
        }

        self.shared.control.take_restart();

        let snapshot = DeviceSnapshot::capture(&mut self.backend);
        let ordinal = self.shared.control.selected_ordinal();
        let target = snapshot.resolve(ordinal);
        self.shared.publish_devices(snapshot);

        let Some(target) = target else {
            log::error!("device at ordinal {} vanished; capture disabled", ordinal);
            self.shared.control.set_capture_enabled(false);
            return;
        };

        let loopback = target.wants_loopback();
        log::info!(
            "opening audio device {}: {} (loopback: {})",
            target.ordinal,
            target.display_name,
            loopback
        );

        let mut session = match self.backend.open_session(&target, loopback) {
            Ok(session) => session,
            Err(e) => {
                // Not retried automatically; the operator must re-enable.
                log::error!(
                    "failed to open device {} ({}): {}",
                    target.ordinal,
                    target.display_name,
                    e
                );
                self.shared.control.set_capture_enabled(false);
                return;
            }
        };

        let format = session.format();
        log::info!(
            "audio session open: {} Hz, {} channels, {} bits",
            format.sample_rate,
            format.channel_count,
            format.bits_per_sample
        );

        self.shared.set_state(EngineState::Streaming);
        self.stream(&mut session);

        self.shared.set_state(EngineState::Draining);
        session.close();
        log::info!("audio session closed (device {})", target.ordinal);
    }

    /// The steady-state pull loop.
    ///
    /// Exits when capture is disabled, a restart (device switch) is
    /// pending, shutdown is requested, or the session raises a
    /// non-recoverable error — always before the next pull.
    fn stream<S: EndpointSession>(&mut self, session: &mut S) {
        loop {
            let control = &self.shared.control;
            if control.shutdown_requested() || !control.capture_enabled() || control.restart_pending()
            {
                return;
            }

            match session.pull() {
                Ok(batches) => {
                    if batches.is_empty() {
                        thread::sleep(PULL_IDLE);
                        continue;
                    }
                    for batch in &batches {
                        (self.sink)(&batch.samples, batch.channel_count);
                    }
                }
                Err(e) => {
                    log::error!("capture pull failed: {}", e);
                    return;
                }
            }
        }
    }
}

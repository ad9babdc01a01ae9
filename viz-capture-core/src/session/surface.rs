use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::models::audio_models::DEFAULT_ORDINAL;
use crate::models::error::CaptureError;
use crate::models::state::EngineState;
use crate::session::control::EngineShared;
use crate::session::engine::CaptureEngine;
use crate::session::registry::next_ordinal;
use crate::traits::backend::CaptureBackend;
use crate::traits::pcm_sink::PcmSinkCallback;

/// Bounded wait for the capture thread to acknowledge a stop.
const STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// External-facing capture API.
///
/// Spawns the dedicated capture thread and mutates its control state;
/// every operation is callable from any thread and, except for `stop()`,
/// returns without blocking. Dropping the surface shuts the thread down
/// and joins it, so no native handle outlives the surface.
pub struct ControlSurface {
    shared: Arc<EngineShared>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ControlSurface {
    /// Spawn the capture thread.
    ///
    /// The backend is constructed by `make_backend` *on* the capture
    /// thread, because COM-style backends are affine to the thread that
    /// initialized them. The engine starts parked in idle; call
    /// [`start`](Self::start) to begin capturing.
    pub fn spawn<B, F>(make_backend: F, sink: PcmSinkCallback) -> Result<Self, CaptureError>
    where
        B: CaptureBackend,
        F: FnOnce() -> Result<B, CaptureError> + Send + 'static,
    {
        let shared = Arc::new(EngineShared::new());
        let engine_shared = Arc::clone(&shared);

        let handle = thread::Builder::new()
            .name("audio-capture".into())
            .spawn(move || {
                let backend = match make_backend() {
                    Ok(backend) => backend,
                    Err(e) => {
                        log::error!("failed to initialize capture backend: {}", e);
                        return;
                    }
                };
                CaptureEngine::new(backend, engine_shared, sink).run();
            })
            .map_err(|e| CaptureError::Unknown(format!("failed to spawn capture thread: {}", e)))?;

        Ok(Self {
            shared,
            thread: Some(handle),
        })
    }

    /// Enable capture on `initial_ordinal` (−1 for the default loopback).
    pub fn start(&self, initial_ordinal: i32) {
        log::info!("start capture (ordinal {})", initial_ordinal);
        let control = &self.shared.control;
        control.select(initial_ordinal);
        control.set_capture_enabled(true);
        control.request_restart();
    }

    /// Disable capture and wait for the engine to release its session.
    ///
    /// Blocks the caller until the capture thread parks in idle, bounded
    /// by one second; by then every native handle has been closed.
    pub fn stop(&self) {
        log::info!("stop capture");
        self.shared.control.set_capture_enabled(false);
        if !self.shared.wait_for_state(EngineState::Idle, STOP_TIMEOUT) {
            log::warn!(
                "capture thread did not acknowledge stop within {:?}",
                STOP_TIMEOUT
            );
        }
    }

    /// Select a device by ordinal and restart the session onto it.
    ///
    /// −1 is accepted unconditionally; other ordinals are validated
    /// against the last published snapshot and ignored (with a warning)
    /// when out of range.
    pub fn select_device(&self, ordinal: i32) {
        let known = self.shared.real_device_count() as i32;
        if ordinal < DEFAULT_ORDINAL || ordinal >= known {
            log::warn!(
                "ignoring out-of-range device ordinal {} ({} devices known)",
                ordinal,
                known
            );
            return;
        }
        self.shared.control.select(ordinal);
        self.shared.control.request_restart();
    }

    /// Advance the selection cyclically over `[-1, device_count − 1]` and
    /// restart the session onto it.
    pub fn next_device(&self) {
        let next = next_ordinal(
            self.shared.control.selected_ordinal(),
            self.shared.real_device_count(),
        );
        log::info!("switching to device ordinal {}", next);
        self.shared.control.select(next);
        self.shared.control.request_restart();
    }

    /// Ordinal → display name for every selectable target, from the last
    /// enumeration snapshot. Does not affect control state.
    pub fn describe_devices(&self) -> BTreeMap<i32, String> {
        self.shared.device_names()
    }

    /// Display name of the currently selected device, or "Unknown" when
    /// the ordinal no longer resolves.
    pub fn current_device_name(&self) -> String {
        self.shared
            .device_name(self.shared.control.selected_ordinal())
            .unwrap_or_else(|| "Unknown".into())
    }

    pub fn selected_ordinal(&self) -> i32 {
        self.shared.control.selected_ordinal()
    }

    pub fn capture_enabled(&self) -> bool {
        self.shared.control.capture_enabled()
    }

    /// Current state of the capture engine, for status display.
    pub fn engine_state(&self) -> EngineState {
        self.shared.engine_state()
    }
}

impl Drop for ControlSurface {
    fn drop(&mut self) {
        self.shared.control.set_capture_enabled(false);
        self.shared.control.request_shutdown();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Instant;

    use parking_lot::Mutex;

    use crate::models::audio_models::{
        DataFlow, DeviceDescriptor, EndpointInfo, NegotiatedFormat, PcmFrameBatch, SampleEncoding,
    };
    use crate::traits::backend::EndpointSession;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Open { ordinal: i32, loopback: bool },
        OpenFailed { ordinal: i32 },
        Close,
    }

    /// Shared script and event log for the instrumented backend double.
    #[derive(Default)]
    struct Script {
        endpoints: Vec<EndpointInfo>,
        fail_enumeration: bool,
        open_error: Option<CaptureError>,
        pull_error: Option<CaptureError>,
        events: Vec<Event>,
        open_count: usize,
        close_count: usize,
    }

    type SharedScript = Arc<Mutex<Script>>;

    fn script_with_two_devices() -> SharedScript {
        Arc::new(Mutex::new(Script {
            endpoints: vec![
                EndpointInfo {
                    display_name: "Speakers".into(),
                    direction: DataFlow::Render,
                },
                EndpointInfo {
                    display_name: "Microphone".into(),
                    direction: DataFlow::Capture,
                },
            ],
            ..Script::default()
        }))
    }

    struct MockBackend {
        script: SharedScript,
    }

    impl CaptureBackend for MockBackend {
        type Session = MockSession;

        fn list_endpoints(&mut self) -> Result<Vec<EndpointInfo>, CaptureError> {
            let script = self.script.lock();
            if script.fail_enumeration {
                return Err(CaptureError::EnumerationFailed("simulated".into()));
            }
            Ok(script.endpoints.clone())
        }

        fn open_session(
            &mut self,
            target: &DeviceDescriptor,
            loopback: bool,
        ) -> Result<Self::Session, CaptureError> {
            let mut script = self.script.lock();
            if let Some(error) = script.open_error.clone() {
                script.events.push(Event::OpenFailed {
                    ordinal: target.ordinal,
                });
                return Err(error);
            }
            script.open_count += 1;
            script.events.push(Event::Open {
                ordinal: target.ordinal,
                loopback,
            });
            Ok(MockSession {
                script: Arc::clone(&self.script),
                closed: false,
                delivered: false,
            })
        }
    }

    struct MockSession {
        script: SharedScript,
        closed: bool,
        delivered: bool,
    }

    impl EndpointSession for MockSession {
        fn format(&self) -> NegotiatedFormat {
            NegotiatedFormat {
                sample_rate: 48000,
                channel_count: 2,
                bits_per_sample: 32,
                sample_encoding: SampleEncoding::IeeeFloat,
            }
        }

        fn pull(&mut self) -> Result<Vec<PcmFrameBatch>, CaptureError> {
            if let Some(error) = self.script.lock().pull_error.take() {
                return Err(error);
            }
            // One batch per session, then silence; the engine sleeps on
            // empty pulls instead of spinning.
            if self.delivered {
                return Ok(Vec::new());
            }
            self.delivered = true;
            Ok(vec![PcmFrameBatch {
                samples: vec![0.25; 8],
                channel_count: 2,
                frame_count: 4,
            }])
        }

        fn close(&mut self) {
            if !self.closed {
                self.closed = true;
                let mut script = self.script.lock();
                script.close_count += 1;
                script.events.push(Event::Close);
            }
        }
    }

    impl Drop for MockSession {
        fn drop(&mut self) {
            self.close();
        }
    }

    fn spawn_surface(script: &SharedScript, sink: PcmSinkCallback) -> ControlSurface {
        let script = Arc::clone(script);
        ControlSurface::spawn(move || Ok(MockBackend { script }), sink).unwrap()
    }

    fn null_sink() -> PcmSinkCallback {
        Arc::new(|_, _| {})
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn stop_releases_every_opened_session() {
        let script = script_with_two_devices();
        let surface = spawn_surface(&script, null_sink());

        surface.start(-1);
        assert!(surface
            .shared
            .wait_for_state(EngineState::Streaming, Duration::from_secs(2)));

        surface.stop();
        assert!(surface.engine_state().is_idle());

        let script = script.lock();
        assert_eq!(script.open_count, 1);
        assert_eq!(script.close_count, script.open_count);
    }

    #[test]
    fn stop_right_after_start_opens_nothing_afterwards() {
        let script = script_with_two_devices();
        let surface = spawn_surface(&script, null_sink());

        // Land the stop inside the start-to-first-cycle window: whichever
        // side wins, no session may be opened once stop() has returned.
        surface.start(-1);
        surface.stop();

        let opens_at_stop = script.lock().open_count;
        assert_eq!(opens_at_stop, script.lock().close_count);
        assert!(!surface.capture_enabled());

        thread::sleep(Duration::from_millis(250));
        let script = script.lock();
        assert_eq!(script.open_count, opens_at_stop);
        assert_eq!(script.close_count, script.open_count);
    }

    #[test]
    fn pull_failure_drains_and_reopens_the_device() {
        let script = script_with_two_devices();
        let surface = spawn_surface(&script, null_sink());

        surface.start(-1);
        assert!(surface
            .shared
            .wait_for_state(EngineState::Streaming, Duration::from_secs(2)));

        // A failing pull is non-recoverable for the session: the engine
        // drains it and, with capture still enabled, reselects the same
        // ordinal — old session fully closed before the new one opens.
        script.lock().pull_error = Some(CaptureError::Unknown("simulated stream fault".into()));
        assert!(wait_until(|| script.lock().events.len() >= 3));

        let events = script.lock().events.clone();
        assert_eq!(
            &events[..3],
            &[
                Event::Open {
                    ordinal: -1,
                    loopback: true
                },
                Event::Close,
                Event::Open {
                    ordinal: -1,
                    loopback: true
                },
            ]
        );
        assert!(surface.capture_enabled());

        surface.stop();
        let script = script.lock();
        assert_eq!(script.open_count, 2);
        assert_eq!(script.close_count, script.open_count);
    }

    #[test]
    fn switch_device_closes_old_session_before_opening_new() {
        let script = script_with_two_devices();
        let surface = spawn_surface(&script, null_sink());

        surface.start(-1);
        assert!(surface
            .shared
            .wait_for_state(EngineState::Streaming, Duration::from_secs(2)));

        // Ordinal 1 is the capture-direction microphone, so the reopened
        // session must not use loopback.
        surface.select_device(1);
        assert!(wait_until(|| script.lock().events.len() >= 3));

        let events = script.lock().events.clone();
        assert_eq!(
            &events[..3],
            &[
                Event::Open {
                    ordinal: -1,
                    loopback: true
                },
                Event::Close,
                Event::Open {
                    ordinal: 1,
                    loopback: false
                },
            ]
        );

        surface.stop();
        let script = script.lock();
        assert_eq!(script.open_count, script.close_count);
    }

    #[test]
    fn open_failure_disables_capture_and_keeps_queries_working() {
        let script = script_with_two_devices();
        script.lock().open_error = Some(CaptureError::UnsupportedFormat {
            format_tag: 0x0001,
            bits_per_sample: 16,
        });
        let surface = spawn_surface(&script, null_sink());

        surface.start(0);
        assert!(wait_until(|| !surface.capture_enabled()));
        assert!(surface
            .shared
            .wait_for_state(EngineState::Idle, Duration::from_secs(2)));

        let events = script.lock().events.clone();
        assert_eq!(events, vec![Event::OpenFailed { ordinal: 0 }]);
        assert_eq!(script.lock().open_count, 0);

        // The control surface stays usable after the failure.
        let names = surface.describe_devices();
        assert_eq!(names.len(), 3);
        assert_eq!(names[&-1], "Default Loopback");
    }

    #[test]
    fn vanished_ordinal_falls_back_to_idle() {
        let script = script_with_two_devices();
        let surface = spawn_surface(&script, null_sink());

        surface.start(7);
        assert!(wait_until(|| !surface.capture_enabled()));
        assert!(surface
            .shared
            .wait_for_state(EngineState::Idle, Duration::from_secs(2)));
        assert!(script.lock().events.is_empty());
    }

    #[test]
    fn delivers_batches_to_the_sink() {
        let script = script_with_two_devices();
        let (tx, rx) = mpsc::channel::<(Vec<f32>, u16)>();
        let sink: PcmSinkCallback = Arc::new(move |samples, channels| {
            let _ = tx.send((samples.to_vec(), channels));
        });
        let surface = spawn_surface(&script, sink);

        surface.start(-1);
        let (samples, channels) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(channels, 2);
        assert_eq!(samples, vec![0.25; 8]);

        surface.stop();
    }

    #[test]
    fn enumeration_failure_still_lists_the_default_entry() {
        let script = script_with_two_devices();
        script.lock().fail_enumeration = true;
        let surface = spawn_surface(&script, null_sink());

        assert!(wait_until(|| surface.describe_devices().contains_key(&-1)));
        let names = surface.describe_devices();
        assert_eq!(names.len(), 1);
        assert_eq!(surface.current_device_name(), "Default Loopback");
    }

    #[test]
    fn next_device_cycles_over_the_closed_range() {
        let script = script_with_two_devices();
        let surface = spawn_surface(&script, null_sink());

        // Wait for the initial snapshot so the device count is known.
        assert!(wait_until(|| surface.describe_devices().len() == 3));

        assert_eq!(surface.selected_ordinal(), -1);
        surface.next_device();
        assert_eq!(surface.selected_ordinal(), 0);
        surface.next_device();
        assert_eq!(surface.selected_ordinal(), 1);
        surface.next_device();
        assert_eq!(surface.selected_ordinal(), -1);
    }

    #[test]
    fn select_device_rejects_out_of_range_ordinals() {
        let script = script_with_two_devices();
        let surface = spawn_surface(&script, null_sink());
        assert!(wait_until(|| surface.describe_devices().len() == 3));

        surface.select_device(5);
        assert_eq!(surface.selected_ordinal(), -1);
        surface.select_device(-3);
        assert_eq!(surface.selected_ordinal(), -1);

        surface.select_device(1);
        assert_eq!(surface.selected_ordinal(), 1);
        assert_eq!(surface.current_device_name(), "Microphone");
    }

    #[test]
    fn drop_joins_the_capture_thread_and_closes_sessions() {
        let script = script_with_two_devices();
        {
            let surface = spawn_surface(&script, null_sink());
            surface.start(-1);
            assert!(surface
                .shared
                .wait_for_state(EngineState::Streaming, Duration::from_secs(2)));
        }

        let script = script.lock();
        assert_eq!(script.open_count, 1);
        assert_eq!(script.close_count, 1);
    }
}

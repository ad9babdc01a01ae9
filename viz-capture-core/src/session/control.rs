use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::models::audio_models::DEFAULT_ORDINAL;
use crate::models::state::EngineState;
use crate::session::registry::DeviceSnapshot;

/// Cross-thread control flags for the capture engine.
///
/// Written by any thread through the control surface; read — and for the
/// restart flag, consumed — only by the capture thread. Each field is an
/// independent atomic with last-write-wins semantics; the triad is never
/// read as a group. `restart_requested` is the sole cross-thread wake-up
/// signal, so one poll cycle of staleness on the other fields is fine.
#[derive(Debug)]
pub struct ControlState {
    selected_ordinal: AtomicI32,
    capture_enabled: AtomicBool,
    restart_requested: AtomicBool,
    shutdown: AtomicBool,
}

impl ControlState {
    fn new() -> Self {
        Self {
            selected_ordinal: AtomicI32::new(DEFAULT_ORDINAL),
            capture_enabled: AtomicBool::new(false),
            restart_requested: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn selected_ordinal(&self) -> i32 {
        self.selected_ordinal.load(Ordering::SeqCst)
    }

    pub fn select(&self, ordinal: i32) {
        self.selected_ordinal.store(ordinal, Ordering::SeqCst);
    }

    pub fn capture_enabled(&self) -> bool {
        self.capture_enabled.load(Ordering::SeqCst)
    }

    pub fn set_capture_enabled(&self, enabled: bool) {
        self.capture_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn request_restart(&self) {
        self.restart_requested.store(true, Ordering::SeqCst);
    }

    pub fn restart_pending(&self) -> bool {
        self.restart_requested.load(Ordering::SeqCst)
    }

    /// Consume the restart flag. Called exactly once per engine cycle, at
    /// the start of the selecting phase.
    pub fn take_restart(&self) -> bool {
        self.restart_requested.swap(false, Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// State shared between the capture thread and the control surface.
///
/// The capture thread publishes its machine state (so `stop()` can wait,
/// bounded, for acknowledgement) and its latest enumeration snapshot (so
/// device queries never have to call into the thread-affine backend).
pub struct EngineShared {
    pub(crate) control: ControlState,
    state: Mutex<EngineState>,
    state_changed: Condvar,
    devices: Mutex<DeviceSnapshot>,
}

impl EngineShared {
    pub(crate) fn new() -> Self {
        Self {
            control: ControlState::new(),
            state: Mutex::new(EngineState::Idle),
            state_changed: Condvar::new(),
            devices: Mutex::new(DeviceSnapshot::default()),
        }
    }

    pub fn engine_state(&self) -> EngineState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, next: EngineState) {
        let mut state = self.state.lock();
        if *state != next {
            log::debug!("engine state {:?} → {:?}", *state, next);
            *state = next;
            self.state_changed.notify_all();
        }
    }

    /// Block until the engine reaches `target`, or `timeout` elapses.
    /// Returns whether the state was reached.
    pub fn wait_for_state(&self, target: EngineState, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while *state != target {
            if self
                .state_changed
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return *state == target;
            }
        }
        true
    }

    pub(crate) fn publish_devices(&self, snapshot: DeviceSnapshot) {
        *self.devices.lock() = snapshot;
    }

    /// Ordinal → display name from the last published snapshot.
    pub fn device_names(&self) -> BTreeMap<i32, String> {
        self.devices.lock().names()
    }

    /// Real device count from the last published snapshot.
    pub fn real_device_count(&self) -> usize {
        self.devices.lock().real_count()
    }

    /// Display name for an ordinal, if it resolves against the last
    /// published snapshot.
    pub fn device_name(&self, ordinal: i32) -> Option<String> {
        self.devices.lock().resolve(ordinal).map(|d| d.display_name)
    }
}

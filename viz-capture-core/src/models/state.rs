/// Capture engine state machine.
///
/// State transitions:
/// ```text
/// idle → selecting → streaming → draining → selecting (still enabled)
///            ↓                       ↓
///           idle (open failed)      idle (disabled)
/// ```
///
/// Exactly one dedicated thread drives these transitions; other threads
/// only observe the published state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No session open, thread parked on a bounded poll.
    Idle,
    /// A session is being opened against the selected device.
    Selecting,
    /// The pull loop is active.
    Streaming,
    /// The session is being closed before re-selection or idling.
    Draining,
}

impl EngineState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }
}

use std::sync::Arc;

/// Callback invoked for every non-empty PCM batch.
///
/// Parameters:
/// - `samples`: Interleaved f32 samples at the session's negotiated rate.
/// - `channels`: Number of interleaved channels in `samples`.
///
/// The callback runs inline on the capture thread — keep processing
/// minimal; anything expensive stalls the pull loop.
pub type PcmSinkCallback = Arc<dyn Fn(&[f32], u16) + Send + Sync + 'static>;

//! Fire-and-forget progress notifications.

/// Receives `(message, fraction)` notifications, e.g. during replay.
///
/// Implementations must be cheap and must not fail; the engine never waits
/// on a sink.
pub trait ProgressSink: Send + Sync {
    /// Report progress. `fraction` is in `0.0..=1.0`.
    fn progress(&self, message: &str, fraction: f32);
}

/// Sink that drops every notification.
#[derive(Debug, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn progress(&self, _message: &str, _fraction: f32) {}
}

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            elapsed: None,
        }
    }

    pub fn timed(message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            message: message.into(),
            elapsed: Some(elapsed),
        }
    }
}

/// Receives user-facing progress and diagnostics. Passed into every call
/// instead of being installed globally.
pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Drops every event.
pub struct SilentSink;

impl ProgressSink for SilentSink {
    fn event(&self, _event: ProgressEvent) {}
}

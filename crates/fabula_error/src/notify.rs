//! Notification delivery error types.

/// Notification error with source location.
///
/// Delivery failures are logged by the caller and never propagate into the
/// session operation that triggered the notification.
#[derive(Debug, Clone)]
pub struct NotifyError {
    /// Error message
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl NotifyError {
    /// Create a new NotifyError with the given message at the current location.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: location.line(),
            file: location.file(),
        }
    }
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Notification Error: {} at line {} in {}",
            self.message, self.line, self.file
        )
    }
}

impl std::error::Error for NotifyError {}

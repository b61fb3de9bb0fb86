//! Session state store error types.

/// Specific error conditions for session state operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StateErrorKind {
    /// The backing store could not be reached or the read/write failed
    Io(String),
    /// A stored record exists but could not be decoded
    Corrupt(String),
}

impl std::fmt::Display for StateErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateErrorKind::Io(msg) => write!(f, "Session store I/O failure: {}", msg),
            StateErrorKind::Corrupt(msg) => write!(f, "Session record corrupt: {}", msg),
        }
    }
}

/// Error type for session state operations.
#[derive(Debug, Clone)]
pub struct StateError {
    /// The specific error condition
    pub kind: StateErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl StateError {
    /// Create a new StateError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: StateErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

impl std::fmt::Display for StateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "State Error: {} at line {} in {}",
            self.kind, self.line, self.file
        )
    }
}

impl std::error::Error for StateError {}

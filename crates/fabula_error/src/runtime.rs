//! Narrative runtime error types.

/// Specific error conditions raised by a narrative runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RuntimeErrorKind {
    /// Story content failed to parse; permanent until the content is replaced
    Parse(String),
    /// A saved interpreter snapshot failed to deserialize; permanent for the
    /// session that owns it
    CorruptSnapshot(String),
    /// Transient failure loading content or snapshot bytes
    Io(String),
}

impl std::fmt::Display for RuntimeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeErrorKind::Parse(msg) => write!(f, "Failed to parse story: {}", msg),
            RuntimeErrorKind::CorruptSnapshot(msg) => {
                write!(f, "Saved story state is unreadable: {}", msg)
            }
            RuntimeErrorKind::Io(msg) => write!(f, "Runtime I/O failure: {}", msg),
        }
    }
}

/// Error type for narrative runtime operations.
///
/// # Examples
///
/// ```
/// use fabula_error::{RuntimeError, RuntimeErrorKind};
///
/// let err = RuntimeError::new(RuntimeErrorKind::Parse("missing [nodes]".into()));
/// assert!(err.is_parse());
/// ```
#[derive(Debug, Clone)]
pub struct RuntimeError {
    /// The specific error condition
    pub kind: RuntimeErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl RuntimeError {
    /// Create a new RuntimeError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: RuntimeErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// True when the kind is [`RuntimeErrorKind::Parse`].
    pub fn is_parse(&self) -> bool {
        matches!(self.kind, RuntimeErrorKind::Parse(_))
    }

    /// True when the kind is [`RuntimeErrorKind::CorruptSnapshot`].
    pub fn is_corrupt_snapshot(&self) -> bool {
        matches!(self.kind, RuntimeErrorKind::CorruptSnapshot(_))
    }
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Runtime Error: {} at line {} in {}",
            self.kind, self.line, self.file
        )
    }
}

impl std::error::Error for RuntimeError {}

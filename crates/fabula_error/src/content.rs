//! Content store error types.

/// Specific error conditions for content store operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContentErrorKind {
    /// No content is stored under the requested story id
    NotFound(String),
    /// Content could not be read from the backing store
    Read(String),
    /// Content could not be written to the backing store
    Write(String),
}

impl std::fmt::Display for ContentErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentErrorKind::NotFound(story) => write!(f, "Story '{}' not found", story),
            ContentErrorKind::Read(msg) => write!(f, "Failed to read story content: {}", msg),
            ContentErrorKind::Write(msg) => write!(f, "Failed to write story content: {}", msg),
        }
    }
}

/// Error type for content store operations.
///
/// # Examples
///
/// ```
/// use fabula_error::{ContentError, ContentErrorKind};
///
/// let err = ContentError::new(ContentErrorKind::NotFound("maze".into()));
/// assert!(format!("{}", err).contains("maze"));
/// ```
#[derive(Debug, Clone)]
pub struct ContentError {
    /// The specific error condition
    pub kind: ContentErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl ContentError {
    /// Create a new ContentError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ContentErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// True when the kind is [`ContentErrorKind::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ContentErrorKind::NotFound(_))
    }
}

impl std::fmt::Display for ContentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Content Error: {} at line {} in {}",
            self.kind, self.line, self.file
        )
    }
}

impl std::error::Error for ContentError {}

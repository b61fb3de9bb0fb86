//! Session operation outcomes.
//!
//! Session operations never use generic exceptions for control flow: every
//! failure mode a caller is expected to handle is a tagged variant of
//! [`SessionErrorKind`]. Unexpected failures travel in the `Internal`
//! variant to the top-level boundary for logging.

use fabula_core::{StepResult, StoryId};
use fabula_error::FabulaError;

/// Session error variants.
#[derive(Debug)]
pub enum SessionErrorKind {
    /// No story content, or no session, exists for the request
    StoryNotFound,
    /// The user already has a live session for a story
    AlreadyPlaying(StoryId),
    /// The story cannot be started (parse failure or a standing loop flag)
    StoryNotStartable(String),
    /// The session cannot continue; it was torn down or marked broken
    StoryNotContinueable,
    /// The submitted choice index is out of range or stale
    InvalidChoice {
        /// Index the user submitted
        given: usize,
        /// Size of the pending choice set
        available: usize,
    },
    /// A transient infrastructure problem; the session is intact, retry later
    TemporaryProblem(String),
    /// The step ran but its outcome could not be persisted.
    ///
    /// Narrative progress already advanced in memory; the carried
    /// [`StepResult`] lets the caller warn the user that their saved
    /// position may be stale and offer explicit recovery.
    CouldNotSaveState(Box<StepResult>),
    /// The step was interrupted by the wall-clock budget; the session is
    /// intact and the user may retry
    TimeBudgetExceeded,
    /// Unexpected failure, propagated for logging rather than interpreted
    /// as a narrative outcome
    Internal(FabulaError),
}

impl std::fmt::Display for SessionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionErrorKind::StoryNotFound => write!(f, "Story not found"),
            SessionErrorKind::AlreadyPlaying(story) => {
                write!(f, "Already playing story '{}'", story)
            }
            SessionErrorKind::StoryNotStartable(msg) => {
                write!(f, "Story cannot be started: {}", msg)
            }
            SessionErrorKind::StoryNotContinueable => write!(f, "Story cannot be continued"),
            SessionErrorKind::InvalidChoice { given, available } => {
                write!(f, "Choice {} is not one of the {} offered", given, available)
            }
            SessionErrorKind::TemporaryProblem(msg) => {
                write!(f, "Temporary problem, try again: {}", msg)
            }
            SessionErrorKind::CouldNotSaveState(_) => {
                write!(f, "Progress could not be saved")
            }
            SessionErrorKind::TimeBudgetExceeded => {
                write!(f, "The story took too long to respond")
            }
            SessionErrorKind::Internal(e) => write!(f, "Internal failure: {}", e),
        }
    }
}

/// Session error with source location tracking.
#[derive(Debug)]
pub struct SessionError {
    /// The specific outcome
    pub kind: SessionErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl SessionError {
    /// Create a new SessionError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: SessionErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// True for outcomes a caller renders as user guidance rather than
    /// escalating: invalid choices, missing stories, time budget retries.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self.kind,
            SessionErrorKind::StoryNotFound
                | SessionErrorKind::AlreadyPlaying(_)
                | SessionErrorKind::InvalidChoice { .. }
                | SessionErrorKind::TimeBudgetExceeded
        )
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Session Error: {} at line {} in {}",
            self.kind, self.line, self.file
        )
    }
}

impl std::error::Error for SessionError {}

impl From<FabulaError> for SessionError {
    fn from(err: FabulaError) -> Self {
        SessionError::new(SessionErrorKind::Internal(err))
    }
}

/// Result type for session operations.
pub type SessionResult<T> = std::result::Result<T, SessionError>;

//! Error types for the Fabula story-session engine.
//!
//! This crate provides the foundation error types used throughout the Fabula
//! workspace. Domain-specific errors live in their own modules and fold into
//! the crate-level [`FabulaError`] aggregate.

mod content;
mod json;
mod notify;
mod runtime;
mod state;

pub use content::{ContentError, ContentErrorKind};
pub use json::JsonError;
pub use notify::NotifyError;
pub use runtime::{RuntimeError, RuntimeErrorKind};
pub use state::{StateError, StateErrorKind};

/// Crate-level error variants.
///
/// This is the foundation error enum. Each Fabula crate contributes its
/// domain error through a `From` conversion.
#[derive(Debug, derive_more::From)]
pub enum FabulaErrorKind {
    /// Story content storage error
    Content(ContentError),
    /// Session state storage error
    State(StateError),
    /// Narrative runtime error
    Runtime(RuntimeError),
    /// Notification delivery error
    Notify(NotifyError),
    /// JSON serialization/deserialization error
    Json(JsonError),
}

impl std::fmt::Display for FabulaErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FabulaErrorKind::Content(e) => write!(f, "{}", e),
            FabulaErrorKind::State(e) => write!(f, "{}", e),
            FabulaErrorKind::Runtime(e) => write!(f, "{}", e),
            FabulaErrorKind::Notify(e) => write!(f, "{}", e),
            FabulaErrorKind::Json(e) => write!(f, "{}", e),
        }
    }
}

/// Fabula error with kind discrimination.
#[derive(Debug)]
pub struct FabulaError(Box<FabulaErrorKind>);

impl FabulaError {
    /// Create a new error from a kind.
    pub fn new(kind: FabulaErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &FabulaErrorKind {
        &self.0
    }
}

impl std::fmt::Display for FabulaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fabula Error: {}", self.0)
    }
}

impl std::error::Error for FabulaError {}

// Generic From implementation for any type that converts to FabulaErrorKind
impl<T> From<T> for FabulaError
where
    T: Into<FabulaErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Fabula operations.
pub type FabulaResult<T> = std::result::Result<T, FabulaError>;

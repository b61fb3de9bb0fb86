//! Store contracts consumed by the session engine.
//!
//! The engine only depends on these traits; backing implementations (SQL,
//! in-memory) live behind them. The in-memory implementations in
//! [`crate::memory`] serve tests and the CLI.

use crate::issues::{IssueClass, Notice};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fabula_core::{StepResult, StoryId, UserId};
use fabula_error::FabulaResult;
use serde::{Deserialize, Serialize};

/// Persisted interpreter state for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedState {
    /// Opaque interpreter snapshot
    pub snapshot: Vec<u8>,
    /// The last step result, kept for read-only re-rendering
    pub rendered: StepResult,
    /// Fatal-error marker; a broken record is never re-rendered
    pub broken: bool,
    /// When this state was written
    pub saved_at: DateTime<Utc>,
}

impl SavedState {
    /// Creates a healthy state stamped with the current time.
    pub fn new(snapshot: Vec<u8>, rendered: StepResult) -> Self {
        Self {
            snapshot,
            rendered,
            broken: false,
            saved_at: Utc::now(),
        }
    }
}

/// One user's current engagement with one story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// The story being played
    pub story: StoryId,
    /// Interpreter state; absent for a freshly created session
    pub state: Option<SavedState>,
}

/// Storage for story content.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Loads the content bytes for a story.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` content error when no content is stored under
    /// the id, and a `Read` error on infrastructure failure.
    async fn load(&self, story: &StoryId) -> FabulaResult<Vec<u8>>;

    /// Replaces a story's content wholesale.
    ///
    /// The engine's `replace_content` operation wraps this with issue-flag
    /// clearing and player notification; the store itself is plain CRUD.
    ///
    /// # Errors
    ///
    /// Returns a `Write` error on infrastructure failure.
    async fn replace(&self, story: &StoryId, bytes: Vec<u8>) -> FabulaResult<()>;

    /// The user who owns (uploaded) the story, when known.
    ///
    /// # Errors
    ///
    /// Returns a `Read` error on infrastructure failure.
    async fn owner(&self, story: &StoryId) -> FabulaResult<Option<UserId>>;
}

/// Storage for per-user sessions. At most one session exists per user.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The user's current session, if any.
    async fn current(&self, user: UserId) -> FabulaResult<Option<SessionRecord>>;

    /// Creates the user's session for a story, with fresh (absent) state.
    async fn set_current(&self, user: UserId, story: &StoryId) -> FabulaResult<()>;

    /// Deletes the user's session; returns whether one existed.
    async fn clear_current(&self, user: UserId) -> FabulaResult<bool>;

    /// Writes interpreter state into the user's session.
    async fn save_state(&self, user: UserId, state: SavedState) -> FabulaResult<()>;

    /// Resets the user's session state to fresh (absent), keeping the
    /// session itself.
    async fn reset_state(&self, user: UserId) -> FabulaResult<()>;

    /// Users currently playing the given story.
    async fn players_of(&self, story: &StoryId) -> FabulaResult<Vec<UserId>>;
}

/// Storage for per-story issue flags and the runaway-loop counter.
#[async_trait]
pub trait IssueStore: Send + Sync {
    /// True when the flag for the class is set.
    async fn is_flagged(&self, story: &StoryId, class: IssueClass) -> FabulaResult<bool>;

    /// Sets the flag for the class; returns true when it was newly set.
    async fn set_flag(&self, story: &StoryId, class: IssueClass) -> FabulaResult<bool>;

    /// Atomically increments the story's budget-exceeded counter and
    /// returns the new count.
    async fn bump_budget_exceeded(&self, story: &StoryId) -> FabulaResult<u32>;

    /// Clears every flag and the counter for the story.
    async fn clear(&self, story: &StoryId) -> FabulaResult<()>;
}

/// Delivery of structured notices to users.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Sends a notice to one recipient.
    ///
    /// # Errors
    ///
    /// Returns error when delivery fails; the engine logs such failures and
    /// never propagates them into session operations.
    async fn send(&self, recipient: UserId, notice: Notice) -> FabulaResult<()>;
}

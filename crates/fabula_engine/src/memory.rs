//! In-memory store implementations.
//!
//! HashMap-backed stores protected by `tokio::sync::RwLock`, used by the
//! integration tests and the CLI's terminal play loop. All data is lost
//! when the store is dropped.

use crate::issues::{IssueClass, Notice};
use crate::stores::{
    ContentStore, IssueStore, NotificationSink, SavedState, SessionRecord, SessionStore,
};
use async_trait::async_trait;
use fabula_core::{StoryId, UserId};
use fabula_error::{
    ContentError, ContentErrorKind, FabulaResult, NotifyError, StateError, StateErrorKind,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredContent {
    bytes: Vec<u8>,
    owner: Option<UserId>,
}

/// In-memory [`ContentStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryContentStore {
    entries: Arc<RwLock<HashMap<StoryId, StoredContent>>>,
}

impl MemoryContentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts content with an owner, bypassing the replace flow.
    pub async fn insert(&self, story: StoryId, bytes: Vec<u8>, owner: Option<UserId>) {
        self.entries
            .write()
            .await
            .insert(story, StoredContent { bytes, owner });
    }

    /// Removes a story's content entirely.
    pub async fn remove(&self, story: &StoryId) -> bool {
        self.entries.write().await.remove(story).is_some()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn load(&self, story: &StoryId) -> FabulaResult<Vec<u8>> {
        match self.entries.read().await.get(story) {
            Some(entry) => Ok(entry.bytes.clone()),
            None => Err(ContentError::new(ContentErrorKind::NotFound(
                story.to_string(),
            ))
            .into()),
        }
    }

    async fn replace(&self, story: &StoryId, bytes: Vec<u8>) -> FabulaResult<()> {
        let mut entries = self.entries.write().await;
        let owner = entries.get(story).and_then(|e| e.owner);
        entries.insert(story.clone(), StoredContent { bytes, owner });
        Ok(())
    }

    async fn owner(&self, story: &StoryId) -> FabulaResult<Option<UserId>> {
        Ok(self.entries.read().await.get(story).and_then(|e| e.owner))
    }
}

/// In-memory [`SessionStore`].
///
/// Save failures can be injected with [`Self::fail_saves`] to exercise the
/// `CouldNotSaveState` path.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    records: Arc<RwLock<HashMap<UserId, SessionRecord>>>,
    fail_saves: Arc<AtomicBool>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every `save_state` call fails with an I/O state error.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of live sessions (for testing).
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// True when no sessions exist (for testing).
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn current(&self, user: UserId) -> FabulaResult<Option<SessionRecord>> {
        Ok(self.records.read().await.get(&user).cloned())
    }

    async fn set_current(&self, user: UserId, story: &StoryId) -> FabulaResult<()> {
        self.records.write().await.insert(
            user,
            SessionRecord {
                story: story.clone(),
                state: None,
            },
        );
        Ok(())
    }

    async fn clear_current(&self, user: UserId) -> FabulaResult<bool> {
        Ok(self.records.write().await.remove(&user).is_some())
    }

    async fn save_state(&self, user: UserId, state: SavedState) -> FabulaResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StateError::new(StateErrorKind::Io(
                "injected save failure".to_string(),
            ))
            .into());
        }
        let mut records = self.records.write().await;
        match records.get_mut(&user) {
            Some(record) => {
                record.state = Some(state);
                Ok(())
            }
            None => Err(StateError::new(StateErrorKind::Io(format!(
                "no session for user {user}"
            )))
            .into()),
        }
    }

    async fn reset_state(&self, user: UserId) -> FabulaResult<()> {
        if let Some(record) = self.records.write().await.get_mut(&user) {
            record.state = None;
        }
        Ok(())
    }

    async fn players_of(&self, story: &StoryId) -> FabulaResult<Vec<UserId>> {
        let mut players: Vec<UserId> = self
            .records
            .read()
            .await
            .iter()
            .filter(|(_, record)| &record.story == story)
            .map(|(user, _)| *user)
            .collect();
        players.sort();
        Ok(players)
    }
}

/// In-memory [`IssueStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryIssueStore {
    flags: Arc<RwLock<HashMap<(StoryId, IssueClass), ()>>>,
    counters: Arc<RwLock<HashMap<StoryId, u32>>>,
}

impl MemoryIssueStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current counter value (for testing).
    pub async fn budget_exceeded_count(&self, story: &StoryId) -> u32 {
        self.counters.read().await.get(story).copied().unwrap_or(0)
    }
}

#[async_trait]
impl IssueStore for MemoryIssueStore {
    async fn is_flagged(&self, story: &StoryId, class: IssueClass) -> FabulaResult<bool> {
        Ok(self
            .flags
            .read()
            .await
            .contains_key(&(story.clone(), class)))
    }

    async fn set_flag(&self, story: &StoryId, class: IssueClass) -> FabulaResult<bool> {
        Ok(self
            .flags
            .write()
            .await
            .insert((story.clone(), class), ())
            .is_none())
    }

    async fn bump_budget_exceeded(&self, story: &StoryId) -> FabulaResult<u32> {
        let mut counters = self.counters.write().await;
        let count = counters.entry(story.clone()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn clear(&self, story: &StoryId) -> FabulaResult<()> {
        self.flags.write().await.retain(|(s, _), _| s != story);
        self.counters.write().await.remove(story);
        Ok(())
    }
}

/// Notification sink recording every delivery, with injectable failure.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    sent: Arc<RwLock<Vec<(UserId, Notice)>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every delivery fails.
    pub fn fail_deliveries(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Everything delivered so far.
    pub async fn sent(&self) -> Vec<(UserId, Notice)> {
        self.sent.read().await.clone()
    }

    /// Number of deliveries so far.
    pub async fn count(&self) -> usize {
        self.sent.read().await.len()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, recipient: UserId, notice: Notice) -> FabulaResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::new("injected delivery failure").into());
        }
        self.sent.write().await.push((recipient, notice));
        Ok(())
    }
}

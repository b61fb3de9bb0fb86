//! Issue classification and owner notification.

use crate::stores::{IssueStore, NotificationSink};
use fabula_core::{StoryId, UserId};
use fabula_error::FabulaResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Issue classes a story can be flagged for.
///
/// Each class notifies the story owner at most once per content version;
/// replacing the content resets every flag.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
pub enum IssueClass {
    /// The script failed to parse or raised a fatal runtime error
    ParseError,
    /// The script raised warnings
    ParseWarning,
    /// A step offered more choices than the control grid can deliver
    ChoiceOverflow,
    /// The story repeatedly exceeded the step time budget
    LoopDetected,
}

/// Structured notice delivered through the [`NotificationSink`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notice {
    /// Diagnostic sent to a story owner when an issue is first detected
    StoryIssue {
        /// The story the issue was detected in
        story: StoryId,
        /// Issue classification
        class: IssueClass,
        /// Verbatim diagnostic text
        detail: String,
        /// Up to the last N rendered lines before the issue
        recent_lines: Vec<String>,
    },
    /// Broadcast to current players when a story's content is replaced
    StoryUpdated {
        /// The story that changed
        story: StoryId,
    },
}

/// Verdict for one incomplete step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopVerdict {
    /// The counter is within the threshold; the caller may let the user
    /// retry with the session intact
    Retry {
        /// The new counter value
        count: u32,
    },
    /// The counter crossed the threshold; the story is now flagged and the
    /// session must be torn down
    LoopDetected,
}

/// Gates owner notifications and tracks the runaway-loop counter.
pub struct IssueDetector {
    issues: Arc<dyn IssueStore>,
    notifier: Arc<dyn NotificationSink>,
    loop_threshold: u32,
}

impl IssueDetector {
    /// Creates a detector over the given stores.
    pub fn new(
        issues: Arc<dyn IssueStore>,
        notifier: Arc<dyn NotificationSink>,
        loop_threshold: u32,
    ) -> Self {
        Self {
            issues,
            notifier,
            loop_threshold,
        }
    }

    /// True when the story carries a standing flag for the class.
    pub async fn is_flagged(&self, story: &StoryId, class: IssueClass) -> FabulaResult<bool> {
        self.issues.is_flagged(story, class).await
    }

    /// Reports an issue, notifying the owner only when the class flag was
    /// not already set for this content version.
    pub async fn report(
        &self,
        story: &StoryId,
        owner: Option<UserId>,
        class: IssueClass,
        detail: String,
        recent_lines: Vec<String>,
    ) -> FabulaResult<()> {
        let newly_set = self.issues.set_flag(story, class).await?;
        if !newly_set {
            tracing::debug!(story = %story, class = %class, "issue already reported, suppressing");
            return Ok(());
        }
        tracing::info!(story = %story, class = %class, "story issue detected");
        if let Some(owner) = owner {
            self.dispatch(
                owner,
                Notice::StoryIssue {
                    story: story.clone(),
                    class,
                    detail,
                    recent_lines,
                },
            );
        }
        Ok(())
    }

    /// Handles one incomplete step: bumps the counter unconditionally, and
    /// escalates to [`IssueClass::LoopDetected`] once the count exceeds the
    /// threshold.
    pub async fn budget_exceeded(
        &self,
        story: &StoryId,
        owner: Option<UserId>,
        recent_lines: Vec<String>,
    ) -> FabulaResult<LoopVerdict> {
        let count = self.issues.bump_budget_exceeded(story).await?;
        if count <= self.loop_threshold {
            tracing::debug!(
                story = %story,
                count,
                threshold = self.loop_threshold,
                "step exceeded budget, within threshold"
            );
            return Ok(LoopVerdict::Retry { count });
        }
        self.report(
            story,
            owner,
            IssueClass::LoopDetected,
            format!(
                "{} consecutive steps exceeded the time budget; the story looks stuck in a loop",
                count
            ),
            recent_lines,
        )
        .await?;
        Ok(LoopVerdict::LoopDetected)
    }

    /// Clears every flag and the loop counter for the story.
    ///
    /// Called when content is replaced wholesale; the next issue of any
    /// class will notify the owner again.
    pub async fn reset(&self, story: &StoryId) -> FabulaResult<()> {
        tracing::debug!(story = %story, "resetting issue flags and loop counter");
        self.issues.clear(story).await
    }

    /// Broadcasts a content-replacement notice to current players.
    pub fn broadcast_updated(&self, story: &StoryId, players: Vec<UserId>) {
        for player in players {
            self.dispatch(
                player,
                Notice::StoryUpdated {
                    story: story.clone(),
                },
            );
        }
    }

    /// Fire-and-forget delivery: failures are logged, never propagated into
    /// the session operation that triggered the notice.
    fn dispatch(&self, recipient: UserId, notice: Notice) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.send(recipient, notice).await {
                tracing::warn!(
                    recipient = %recipient,
                    error = %e,
                    "notification delivery failed"
                );
            }
        });
    }
}

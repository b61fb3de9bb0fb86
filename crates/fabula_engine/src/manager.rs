//! The per-user session state machine.

use crate::config::EngineConfig;
use crate::error::{SessionError, SessionErrorKind, SessionResult};
use crate::issues::{IssueClass, IssueDetector, LoopVerdict};
use crate::stepper;
use crate::stores::{ContentStore, IssueStore, NotificationSink, SavedState, SessionStore};
use fabula_core::{SpeakerRegistry, StepResult, StoryId, UserId};
use fabula_error::{FabulaError, FabulaErrorKind};
use fabula_runtime::RuntimeFactory;
use std::sync::Arc;
use std::time::Instant;

/// Result of probing a script outside any session.
#[derive(Debug, Clone, derive_getters::Getters)]
pub struct ProbeReport {
    /// The first step's output
    result: StepResult,
    /// The speaker lookup table the content declares
    speakers: SpeakerRegistry,
    /// Wall-clock time the probe step took
    elapsed_ms: u64,
}

/// Drives story sessions for many users, one live session per user.
///
/// Every operation runs synchronously to completion within the caller's
/// task: state is read from the stores, mutated in memory, and written
/// back with no transaction spanning the call. Operations for the same
/// user must therefore be serialized by the calling layer; operations for
/// different users are fully independent.
pub struct SessionManager {
    content: Arc<dyn ContentStore>,
    sessions: Arc<dyn SessionStore>,
    detector: IssueDetector,
    factory: Arc<dyn RuntimeFactory>,
    config: EngineConfig,
}

/// Maps an infrastructure failure into the transient outcome.
fn temporary(err: FabulaError) -> SessionError {
    SessionError::new(SessionErrorKind::TemporaryProblem(err.to_string()))
}

fn is_content_not_found(err: &FabulaError) -> bool {
    matches!(err.kind(), FabulaErrorKind::Content(e) if e.is_not_found())
}

impl SessionManager {
    /// Creates a manager over the given collaborators.
    pub fn new(
        content: Arc<dyn ContentStore>,
        sessions: Arc<dyn SessionStore>,
        issues: Arc<dyn IssueStore>,
        notifier: Arc<dyn NotificationSink>,
        factory: Arc<dyn RuntimeFactory>,
        config: EngineConfig,
    ) -> Self {
        let detector = IssueDetector::new(issues, notifier, config.loop_threshold);
        Self {
            content,
            sessions,
            detector,
            factory,
            config,
        }
    }

    /// The engine configuration, including pack limits.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Starts a story for a user with no live session.
    ///
    /// Runs the first step, persists the session, and returns the step's
    /// output. Fails without mutation when the user is already playing,
    /// the story is missing, its content cannot start, or it carries a
    /// standing loop flag.
    #[tracing::instrument(skip(self), fields(user = %user, story = %story))]
    pub async fn start(&self, user: UserId, story: StoryId) -> SessionResult<StepResult> {
        if let Some(existing) = self.sessions.current(user).await.map_err(temporary)? {
            tracing::debug!(current = %existing.story, "start rejected, session exists");
            return Err(SessionError::new(SessionErrorKind::AlreadyPlaying(
                existing.story,
            )));
        }

        let bytes = match self.content.load(&story).await {
            Ok(bytes) => bytes,
            Err(e) if is_content_not_found(&e) => {
                return Err(SessionError::new(SessionErrorKind::StoryNotFound));
            }
            Err(e) => return Err(temporary(e)),
        };

        if self
            .detector
            .is_flagged(&story, IssueClass::LoopDetected)
            .await
            .map_err(temporary)?
        {
            return Err(SessionError::new(SessionErrorKind::StoryNotStartable(
                "the story is flagged as looping; replace its content to re-enable it"
                    .to_string(),
            )));
        }

        let owner = self.owner_of(&story).await;
        let mut runtime = match self.factory.fresh(&bytes) {
            Ok(runtime) => runtime,
            Err(e) if e.is_parse() => {
                let detail = e.kind.to_string();
                self.detector
                    .report(
                        &story,
                        owner,
                        IssueClass::ParseError,
                        detail.clone(),
                        Vec::new(),
                    )
                    .await
                    .map_err(temporary)?;
                return Err(SessionError::new(SessionErrorKind::StoryNotStartable(
                    detail,
                )));
            }
            Err(e) => return Err(temporary(e.into())),
        };

        let result = stepper::step(runtime.as_mut(), self.config.step_budget());
        self.route_issues(&story, owner, &result, None).await?;

        let snapshot = runtime.snapshot()?;
        if let Err(e) = self.sessions.set_current(user, &story).await {
            tracing::warn!(error = %e, "failed to create session record");
            return Err(SessionError::new(SessionErrorKind::CouldNotSaveState(
                Box::new(result),
            )));
        }
        if let Err(e) = self
            .sessions
            .save_state(user, SavedState::new(snapshot, result.clone()))
            .await
        {
            tracing::warn!(error = %e, "failed to persist session state");
            return Err(SessionError::new(SessionErrorKind::CouldNotSaveState(
                Box::new(result),
            )));
        }

        tracing::info!(lines = result.lines.len(), "story started");
        Ok(result)
    }

    /// Applies a choice to the user's session and advances one step.
    ///
    /// On natural narrative end the session is deleted; otherwise the new
    /// interpreter state is persisted.
    #[tracing::instrument(skip(self), fields(user = %user, choice))]
    pub async fn advance(&self, user: UserId, choice: usize) -> SessionResult<StepResult> {
        self.advance_inner(user, Some(choice), false).await
    }

    /// Resets the user's session to the top of its story and re-runs the
    /// first step.
    #[tracing::instrument(skip(self), fields(user = %user))]
    pub async fn restart(&self, user: UserId) -> SessionResult<StepResult> {
        if self
            .sessions
            .current(user)
            .await
            .map_err(temporary)?
            .is_none()
        {
            return Err(SessionError::new(SessionErrorKind::StoryNotFound));
        }
        self.sessions.reset_state(user).await.map_err(temporary)?;
        self.advance_inner(user, None, true).await
    }

    /// Ends the user's session unconditionally; idempotent.
    ///
    /// Returns whether a session existed.
    #[tracing::instrument(skip(self), fields(user = %user))]
    pub async fn stop(&self, user: UserId) -> SessionResult<bool> {
        let existed = self.sessions.clear_current(user).await.map_err(temporary)?;
        tracing::debug!(existed, "session stopped");
        Ok(existed)
    }

    /// Read-only re-render of the last step result, without consuming a
    /// choice.
    #[tracing::instrument(skip(self), fields(user = %user))]
    pub async fn state(&self, user: UserId) -> SessionResult<StepResult> {
        let record = self
            .sessions
            .current(user)
            .await
            .map_err(temporary)?
            .ok_or_else(|| SessionError::new(SessionErrorKind::StoryNotFound))?;
        match record.state {
            Some(state) if state.broken => {
                Err(SessionError::new(SessionErrorKind::StoryNotContinueable))
            }
            Some(state) => Ok(state.rendered),
            None => Err(SessionError::new(SessionErrorKind::StoryNotContinueable)),
        }
    }

    /// Validates script content outside any session.
    ///
    /// Builds a runtime, runs one bounded step, and reports the output plus
    /// the declared speakers. No session is touched, nothing is persisted,
    /// and no issues are routed.
    pub fn probe(&self, content: &[u8]) -> SessionResult<ProbeReport> {
        let mut runtime = match self.factory.fresh(content) {
            Ok(runtime) => runtime,
            Err(e) if e.is_parse() => {
                return Err(SessionError::new(SessionErrorKind::StoryNotStartable(
                    e.kind.to_string(),
                )));
            }
            Err(e) => return Err(temporary(e.into())),
        };
        let started = Instant::now();
        let result = stepper::step(runtime.as_mut(), self.config.step_budget());
        let speakers = self.factory.speakers(content).map_err(temporary)?;
        Ok(ProbeReport {
            result,
            speakers,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Replaces a story's content wholesale.
    ///
    /// Clears every issue flag and the loop counter for the story, and
    /// broadcasts a fire-and-forget update notice to its current players.
    #[tracing::instrument(skip(self, bytes), fields(story = %story, bytes = bytes.len()))]
    pub async fn replace_content(&self, story: &StoryId, bytes: Vec<u8>) -> SessionResult<()> {
        self.content
            .replace(story, bytes)
            .await
            .map_err(temporary)?;
        self.detector.reset(story).await.map_err(temporary)?;
        let players = self.sessions.players_of(story).await.map_err(temporary)?;
        tracing::info!(players = players.len(), "story content replaced");
        self.detector.broadcast_updated(story, players);
        Ok(())
    }

    async fn advance_inner(
        &self,
        user: UserId,
        choice: Option<usize>,
        from_top: bool,
    ) -> SessionResult<StepResult> {
        let record = self
            .sessions
            .current(user)
            .await
            .map_err(temporary)?
            .ok_or_else(|| SessionError::new(SessionErrorKind::StoryNotFound))?;
        let story = record.story.clone();

        let bytes = match self.content.load(&story).await {
            Ok(bytes) => bytes,
            Err(e) if is_content_not_found(&e) => {
                // The story was removed outright; the session can never
                // succeed again.
                tracing::warn!(story = %story, "content gone, tearing session down");
                self.teardown(user).await;
                return Err(SessionError::new(SessionErrorKind::StoryNotContinueable));
            }
            Err(e) => return Err(temporary(e)),
        };
        let owner = self.owner_of(&story).await;

        let snapshot = if from_top {
            None
        } else {
            record.state.as_ref().map(|s| s.snapshot.clone())
        };
        let mut runtime = match snapshot {
            Some(snapshot) => match self.factory.restore(&bytes, &snapshot) {
                Ok(runtime) => runtime,
                Err(e) if e.is_corrupt_snapshot() => {
                    tracing::warn!(
                        story = %story,
                        error = %e,
                        "snapshot failed to deserialize, tearing session down"
                    );
                    self.teardown(user).await;
                    return Err(SessionError::new(SessionErrorKind::StoryNotContinueable));
                }
                Err(e) if e.is_parse() => {
                    let detail = e.kind.to_string();
                    self.detector
                        .report(&story, owner, IssueClass::ParseError, detail, Vec::new())
                        .await
                        .map_err(temporary)?;
                    self.teardown(user).await;
                    return Err(SessionError::new(SessionErrorKind::StoryNotContinueable));
                }
                Err(e) => return Err(temporary(e.into())),
            },
            None => match self.factory.fresh(&bytes) {
                Ok(runtime) => runtime,
                Err(e) if e.is_parse() => {
                    let detail = e.kind.to_string();
                    self.detector
                        .report(&story, owner, IssueClass::ParseError, detail, Vec::new())
                        .await
                        .map_err(temporary)?;
                    self.teardown(user).await;
                    return Err(SessionError::new(SessionErrorKind::StoryNotContinueable));
                }
                Err(e) => return Err(temporary(e.into())),
            },
        };

        if let Some(given) = choice {
            let available = runtime.current_choices().len();
            match runtime.choose(given) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(given, available, "choice rejected");
                    return Err(SessionError::new(SessionErrorKind::InvalidChoice {
                        given,
                        available,
                    }));
                }
                Err(e) => return Err(e.into()),
            }
        }

        let result = stepper::step(runtime.as_mut(), self.config.step_budget());
        self.route_issues(&story, owner, &result, Some(user)).await?;

        if result.is_end {
            if let Err(e) = self.sessions.clear_current(user).await {
                tracing::warn!(error = %e, "failed to delete session after narrative end");
            }
            tracing::info!(story = %story, "narrative ended");
            return Ok(result);
        }

        let snapshot = runtime.snapshot()?;
        if let Err(e) = self
            .sessions
            .save_state(user, SavedState::new(snapshot, result.clone()))
            .await
        {
            tracing::warn!(error = %e, "failed to persist session state");
            return Err(SessionError::new(SessionErrorKind::CouldNotSaveState(
                Box::new(result),
            )));
        }
        Ok(result)
    }

    /// Classifies a step's outcome and routes issues to the detector.
    ///
    /// Order is fixed: fatal errors first, then budget handling; warnings
    /// and choice overflow are evaluated only for steps that completed with
    /// zero fatal errors, warnings before overflow.
    async fn route_issues(
        &self,
        story: &StoryId,
        owner: Option<UserId>,
        result: &StepResult,
        session_user: Option<UserId>,
    ) -> SessionResult<()> {
        let recent = result.recent_lines(self.config.diagnostic_lines);

        if result.has_fatal() {
            self.detector
                .report(
                    story,
                    owner,
                    IssueClass::ParseError,
                    result.errors.join("; "),
                    recent,
                )
                .await
                .map_err(temporary)?;
            return match session_user {
                Some(user) => {
                    // Keep the session, but mark it so `state` cannot
                    // replay the failure endlessly.
                    self.mark_broken(user).await;
                    Err(SessionError::new(SessionErrorKind::StoryNotContinueable))
                }
                None => Err(SessionError::new(SessionErrorKind::StoryNotStartable(
                    result.errors.join("; "),
                ))),
            };
        }

        if !result.complete {
            match self
                .detector
                .budget_exceeded(story, owner, recent)
                .await
                .map_err(temporary)?
            {
                LoopVerdict::LoopDetected => {
                    if let Some(user) = session_user {
                        self.teardown(user).await;
                    }
                    return Err(SessionError::new(SessionErrorKind::StoryNotContinueable));
                }
                LoopVerdict::Retry { count } => {
                    tracing::debug!(count, "budget exceeded, session intact");
                    return Err(SessionError::new(SessionErrorKind::TimeBudgetExceeded));
                }
            }
        }

        if !result.warnings.is_empty() {
            self.detector
                .report(
                    story,
                    owner,
                    IssueClass::ParseWarning,
                    result.warnings.join("; "),
                    result.recent_lines(self.config.diagnostic_lines),
                )
                .await
                .map_err(temporary)?;
        }

        let max_controls = self.config.limits.max_controls();
        if result.choices.len() > max_controls {
            self.detector
                .report(
                    story,
                    owner,
                    IssueClass::ChoiceOverflow,
                    format!(
                        "step offered {} choices; at most {} can be delivered",
                        result.choices.len(),
                        max_controls
                    ),
                    result.recent_lines(self.config.diagnostic_lines),
                )
                .await
                .map_err(temporary)?;
        }

        Ok(())
    }

    async fn owner_of(&self, story: &StoryId) -> Option<UserId> {
        match self.content.owner(story).await {
            Ok(owner) => owner,
            Err(e) => {
                tracing::warn!(story = %story, error = %e, "owner lookup failed");
                None
            }
        }
    }

    /// Best-effort session deletion; failures are logged.
    async fn teardown(&self, user: UserId) {
        if let Err(e) = self.sessions.clear_current(user).await {
            tracing::warn!(user = %user, error = %e, "failed to tear down session");
        }
    }

    /// Best-effort fatal marker on the persisted record; failures are
    /// logged.
    async fn mark_broken(&self, user: UserId) {
        let state = match self.sessions.current(user).await {
            Ok(Some(record)) => {
                let mut state = record
                    .state
                    .unwrap_or_else(|| SavedState::new(Vec::new(), StepResult::default()));
                state.broken = true;
                state
            }
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(user = %user, error = %e, "failed to load record for marking");
                return;
            }
        };
        if let Err(e) = self.sessions.save_state(user, state).await {
            tracing::warn!(user = %user, error = %e, "failed to mark session broken");
        }
    }
}

//! Integration tests for the session state machine.

use fabula_core::{StoryId, UserId};
use fabula_engine::memory::{
    MemoryContentStore, MemoryIssueStore, MemorySessionStore, RecordingSink,
};
use fabula_engine::{
    EngineConfig, IssueClass, IssueStore, Notice, SavedState, SessionErrorKind, SessionManager,
    SessionStore,
};
use fabula_runtime::ScriptedFactory;
use std::sync::Arc;
use std::time::Duration;

const MAZE: &str = r#"
    [story]
    title = "The Maze"
    start = "entrance"

    [nodes.entrance]
    lines = ["You wake in a maze.", "Stone walls on every side."]
    choices = [
        { text = "Left", goto = "left" },
        { text = "Right", goto = "right" },
    ]

    [nodes.left]
    lines = ["You go left."]
    choices = [{ text = "Onward", goto = "finale" }]

    [nodes.right]
    lines = ["You go right."]

    [nodes.finale]
    lines = ["Daylight."]
"#;

const SPINNER: &str = r#"
    [story]
    title = "Spinner"
    start = "spin"

    [nodes.spin]
    lines = ["round and round"]
    loop_forever = true
"#;

const WARNY: &str = r#"
    [story]
    title = "Warny"
    start = "a"

    [nodes.a]
    lines = ["Something feels off."]
    warnings = ["deprecated directive near line 4"]
    choices = [{ text = "Shrug", goto = "a" }]
"#;

const DANGLING: &str = r#"
    [story]
    title = "Dangling"
    start = "a"

    [nodes.a]
    lines = ["So far so good."]
    choices = [{ text = "Step", goto = "ghost" }]
"#;

struct Harness {
    manager: SessionManager,
    content: MemoryContentStore,
    sessions: MemorySessionStore,
    issues: MemoryIssueStore,
    sink: RecordingSink,
}

fn harness(config: EngineConfig) -> Harness {
    let content = MemoryContentStore::new();
    let sessions = MemorySessionStore::new();
    let issues = MemoryIssueStore::new();
    let sink = RecordingSink::new();
    let manager = SessionManager::new(
        Arc::new(content.clone()),
        Arc::new(sessions.clone()),
        Arc::new(issues.clone()),
        Arc::new(sink.clone()),
        Arc::new(ScriptedFactory::new()),
        config,
    );
    Harness {
        manager,
        content,
        sessions,
        issues,
        sink,
    }
}

fn story(id: &str) -> StoryId {
    StoryId::new(id)
}

const OWNER: UserId = UserId(999);
const PLAYER: UserId = UserId(1);

async fn seed(h: &Harness, id: &str, script: &str) -> StoryId {
    let story = story(id);
    h.content
        .insert(story.clone(), script.as_bytes().to_vec(), Some(OWNER))
        .await;
    story
}

/// Lets fire-and-forget notification tasks run, then returns the count.
async fn settled_notice_count(sink: &RecordingSink) -> usize {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
    sink.count().await
}

async fn wait_for_notices(sink: &RecordingSink, expected: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while sink.count().await < expected {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("notices were not delivered in time");
}

#[tokio::test]
async fn start_runs_the_first_step() {
    let h = harness(EngineConfig::default());
    let maze = seed(&h, "maze", MAZE).await;

    let result = h.manager.start(PLAYER, maze).await.unwrap();

    assert!(result.complete);
    assert_eq!(result.lines.len(), 2);
    assert_eq!(result.lines[0].text, "You wake in a maze.");
    assert_eq!(result.choices.len(), 2);
    assert_eq!(result.choices[0].text, "Left");
    assert_eq!(h.sessions.len().await, 1);
}

#[tokio::test]
async fn start_while_active_never_mutates_the_session() {
    let h = harness(EngineConfig::default());
    let maze = seed(&h, "maze", MAZE).await;
    let other = seed(&h, "other", MAZE).await;
    h.manager.start(PLAYER, maze.clone()).await.unwrap();
    let before = h.manager.state(PLAYER).await.unwrap();

    let err = h.manager.start(PLAYER, other).await.unwrap_err();

    match err.kind {
        SessionErrorKind::AlreadyPlaying(current) => assert_eq!(current, maze),
        other => panic!("expected AlreadyPlaying, got {other:?}"),
    }
    assert_eq!(h.manager.state(PLAYER).await.unwrap(), before);
}

#[tokio::test]
async fn start_unknown_story_is_not_found() {
    let h = harness(EngineConfig::default());
    let err = h.manager.start(PLAYER, story("ghost")).await.unwrap_err();
    assert!(matches!(err.kind, SessionErrorKind::StoryNotFound));
}

#[tokio::test]
async fn end_to_end_start_pack_advance() {
    let h = harness(EngineConfig::default());
    let maze = seed(&h, "maze", MAZE).await;

    let result = h.manager.start(PLAYER, maze).await.unwrap();
    let messages = fabula_pack::pack(
        &result,
        &fabula_core::SpeakerRegistry::new(),
        &h.manager.config().limits,
    );
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0].text(),
        Some("You wake in a maze.\nStone walls on every side.")
    );
    assert_eq!(messages[0].control_count(), 2);
    let labels: Vec<_> = messages[0].controls()[0]
        .0
        .iter()
        .map(|c| c.label.as_str())
        .collect();
    assert_eq!(labels, vec!["Left", "Right"]);

    let result = h.manager.advance(PLAYER, 0).await.unwrap();
    assert_eq!(result.lines[0].text, "You go left.");
    assert_eq!(result.choices.len(), 1);

    let result = h.manager.advance(PLAYER, 0).await.unwrap();
    assert_eq!(result.lines[0].text, "Daylight.");
    assert!(result.is_end);
    // Natural end deletes the session.
    assert!(h.sessions.is_empty().await);
    let err = h.manager.state(PLAYER).await.unwrap_err();
    assert!(matches!(err.kind, SessionErrorKind::StoryNotFound));
}

#[tokio::test]
async fn out_of_range_choice_is_rejected_without_mutation() {
    let h = harness(EngineConfig::default());
    let maze = seed(&h, "maze", MAZE).await;
    h.manager.start(PLAYER, maze).await.unwrap();
    let before = h.manager.state(PLAYER).await.unwrap();

    let err = h.manager.advance(PLAYER, 7).await.unwrap_err();

    match err.kind {
        SessionErrorKind::InvalidChoice { given, available } => {
            assert_eq!(given, 7);
            assert_eq!(available, 2);
        }
        other => panic!("expected InvalidChoice, got {other:?}"),
    }
    assert_eq!(h.manager.state(PLAYER).await.unwrap(), before);
}

#[tokio::test]
async fn restart_resets_to_the_top() {
    let h = harness(EngineConfig::default());
    let maze = seed(&h, "maze", MAZE).await;
    h.manager.start(PLAYER, maze).await.unwrap();
    let advanced = h.manager.advance(PLAYER, 0).await.unwrap();
    assert_eq!(advanced.lines[0].text, "You go left.");

    let result = h.manager.restart(PLAYER).await.unwrap();

    assert_eq!(result.lines[0].text, "You wake in a maze.");
    let rendered = h.manager.state(PLAYER).await.unwrap();
    assert_eq!(rendered.lines[0].text, "You wake in a maze.");
}

#[tokio::test]
async fn state_re_renders_without_consuming_a_choice() {
    let h = harness(EngineConfig::default());
    let maze = seed(&h, "maze", MAZE).await;
    let started = h.manager.start(PLAYER, maze).await.unwrap();

    let first = h.manager.state(PLAYER).await.unwrap();
    let second = h.manager.state(PLAYER).await.unwrap();

    assert_eq!(first, started);
    assert_eq!(second, started);
}

#[tokio::test]
async fn stop_is_idempotent() {
    let h = harness(EngineConfig::default());
    let maze = seed(&h, "maze", MAZE).await;
    h.manager.start(PLAYER, maze).await.unwrap();

    assert!(h.manager.stop(PLAYER).await.unwrap());
    assert!(!h.manager.stop(PLAYER).await.unwrap());
}

#[tokio::test]
async fn loop_escalates_exactly_past_the_threshold() {
    let config = EngineConfig {
        step_budget_ms: 0,
        loop_threshold: 2,
        ..EngineConfig::default()
    };
    let h = harness(config);
    let spinner = seed(&h, "spinner", SPINNER).await;

    // Counts 1 and 2 stay within the threshold: budget exceeded, no flag.
    for attempt in 1..=2u32 {
        let err = h.manager.start(PLAYER, spinner.clone()).await.unwrap_err();
        assert!(
            matches!(err.kind, SessionErrorKind::TimeBudgetExceeded),
            "attempt {attempt} should be a budget retry"
        );
        assert_eq!(h.issues.budget_exceeded_count(&spinner).await, attempt);
        assert!(
            !h.issues
                .is_flagged(&spinner, IssueClass::LoopDetected)
                .await
                .unwrap()
        );
    }

    // Count 3 crosses the threshold: flag set, operation not continueable.
    let err = h.manager.start(PLAYER, spinner.clone()).await.unwrap_err();
    assert!(matches!(err.kind, SessionErrorKind::StoryNotContinueable));
    assert!(
        h.issues
            .is_flagged(&spinner, IssueClass::LoopDetected)
            .await
            .unwrap()
    );

    // A flagged story refuses to start at all.
    let err = h.manager.start(PLAYER, spinner.clone()).await.unwrap_err();
    assert!(matches!(err.kind, SessionErrorKind::StoryNotStartable(_)));
    // The counter no longer moves once starts are rejected up front.
    assert_eq!(h.issues.budget_exceeded_count(&spinner).await, 3);

    // The owner heard about the loop exactly once.
    wait_for_notices(&h.sink, 1).await;
    let sent = h.sink.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, OWNER);
    assert!(matches!(
        &sent[0].1,
        Notice::StoryIssue {
            class: IssueClass::LoopDetected,
            ..
        }
    ));
}

#[tokio::test]
async fn replace_content_resets_flags_and_counter() {
    let config = EngineConfig {
        step_budget_ms: 0,
        loop_threshold: 0,
        ..EngineConfig::default()
    };
    let h = harness(config);
    let spinner = seed(&h, "spinner", SPINNER).await;

    let err = h.manager.start(PLAYER, spinner.clone()).await.unwrap_err();
    assert!(matches!(err.kind, SessionErrorKind::StoryNotContinueable));
    assert!(
        h.issues
            .is_flagged(&spinner, IssueClass::LoopDetected)
            .await
            .unwrap()
    );

    h.manager
        .replace_content(&spinner, MAZE.as_bytes().to_vec())
        .await
        .unwrap();

    assert!(
        !h.issues
            .is_flagged(&spinner, IssueClass::LoopDetected)
            .await
            .unwrap()
    );
    assert_eq!(h.issues.budget_exceeded_count(&spinner).await, 0);
}

#[tokio::test]
async fn warnings_notify_the_owner_once_per_content_version() {
    let h = harness(EngineConfig::default());
    let warny = seed(&h, "warny", WARNY).await;

    h.manager.start(PLAYER, warny.clone()).await.unwrap();
    wait_for_notices(&h.sink, 1).await;

    // The warning fires again on restart, but stays suppressed.
    h.manager.restart(PLAYER).await.unwrap();
    assert_eq!(settled_notice_count(&h.sink).await, 1);
    let sent = h.sink.sent().await;
    assert!(matches!(
        &sent[0].1,
        Notice::StoryIssue {
            class: IssueClass::ParseWarning,
            ..
        }
    ));

    // Replacing the content re-arms the notification (and tells the
    // current player about the update).
    h.manager
        .replace_content(&warny, WARNY.as_bytes().to_vec())
        .await
        .unwrap();
    h.manager.restart(PLAYER).await.unwrap();
    wait_for_notices(&h.sink, 3).await;
    let warnings = h
        .sink
        .sent()
        .await
        .into_iter()
        .filter(|(_, notice)| {
            matches!(
                notice,
                Notice::StoryIssue {
                    class: IssueClass::ParseWarning,
                    ..
                }
            )
        })
        .count();
    assert_eq!(warnings, 2);
}

#[tokio::test]
async fn parse_failure_at_start_is_reported_and_suppressed() {
    let h = harness(EngineConfig::default());
    let broken = seed(&h, "broken", "not [valid toml").await;

    for _ in 0..2 {
        let err = h.manager.start(PLAYER, broken.clone()).await.unwrap_err();
        assert!(matches!(err.kind, SessionErrorKind::StoryNotStartable(_)));
    }

    assert_eq!(settled_notice_count(&h.sink).await, 1);
    let sent = h.sink.sent().await;
    assert_eq!(sent[0].0, OWNER);
    assert!(matches!(
        &sent[0].1,
        Notice::StoryIssue {
            class: IssueClass::ParseError,
            ..
        }
    ));
}

#[tokio::test]
async fn fatal_mid_step_marks_the_record_broken() {
    let h = harness(EngineConfig::default());
    let dangling = seed(&h, "dangling", DANGLING).await;
    h.manager.start(PLAYER, dangling).await.unwrap();

    let err = h.manager.advance(PLAYER, 0).await.unwrap_err();
    assert!(matches!(err.kind, SessionErrorKind::StoryNotContinueable));

    // The broken marker blocks endless re-rendering of the failure.
    let err = h.manager.state(PLAYER).await.unwrap_err();
    assert!(matches!(err.kind, SessionErrorKind::StoryNotContinueable));
    // The session itself survives so the user can stop or restart.
    assert!(h.manager.stop(PLAYER).await.unwrap());
}

#[tokio::test]
async fn corrupt_snapshot_tears_the_session_down() {
    let h = harness(EngineConfig::default());
    let maze = seed(&h, "maze", MAZE).await;
    let started = h.manager.start(PLAYER, maze).await.unwrap();

    h.sessions
        .save_state(PLAYER, SavedState::new(b"garbage".to_vec(), started))
        .await
        .unwrap();

    let err = h.manager.advance(PLAYER, 0).await.unwrap_err();
    assert!(matches!(err.kind, SessionErrorKind::StoryNotContinueable));
    assert!(h.sessions.is_empty().await);
}

#[tokio::test]
async fn save_failure_surfaces_the_unsaved_progress() {
    let h = harness(EngineConfig::default());
    let maze = seed(&h, "maze", MAZE).await;
    let started = h.manager.start(PLAYER, maze).await.unwrap();

    h.sessions.fail_saves(true);
    let err = h.manager.advance(PLAYER, 0).await.unwrap_err();

    match err.kind {
        SessionErrorKind::CouldNotSaveState(progress) => {
            assert_eq!(progress.lines[0].text, "You go left.");
        }
        other => panic!("expected CouldNotSaveState, got {other:?}"),
    }
    // The persisted position is stale: still the starting step.
    h.sessions.fail_saves(false);
    assert_eq!(h.manager.state(PLAYER).await.unwrap(), started);
}

#[tokio::test]
async fn choice_overflow_is_reported_once() {
    let h = harness(EngineConfig::default());
    let mut script = String::from(
        "[story]\ntitle = \"Doors\"\nstart = \"hall\"\n\n[nodes.hall]\nlines = [\"Doors everywhere.\"]\nchoices = [\n",
    );
    for i in 0..30 {
        script.push_str(&format!("  {{ text = \"Door {i}\", goto = \"hall\" }},\n"));
    }
    script.push_str("]\n");
    let doors = seed(&h, "doors", &script).await;

    let result = h.manager.start(PLAYER, doors).await.unwrap();
    assert_eq!(result.choices.len(), 30);

    wait_for_notices(&h.sink, 1).await;
    let sent = h.sink.sent().await;
    assert!(matches!(
        &sent[0].1,
        Notice::StoryIssue {
            class: IssueClass::ChoiceOverflow,
            ..
        }
    ));

    // Overflow on a later step of the same content stays suppressed.
    h.manager.advance(PLAYER, 0).await.unwrap();
    assert_eq!(settled_notice_count(&h.sink).await, 1);
}

#[tokio::test]
async fn notification_failure_never_fails_the_operation() {
    let h = harness(EngineConfig::default());
    let warny = seed(&h, "warny", WARNY).await;
    h.sink.fail_deliveries(true);

    let result = h.manager.start(PLAYER, warny.clone()).await;

    assert!(result.is_ok());
    // The flag is still set even though delivery failed.
    assert!(
        h.issues
            .is_flagged(&warny, IssueClass::ParseWarning)
            .await
            .unwrap()
    );
    assert_eq!(settled_notice_count(&h.sink).await, 0);
}

#[tokio::test]
async fn replace_content_notifies_current_players() {
    let h = harness(EngineConfig::default());
    let maze = seed(&h, "maze", MAZE).await;
    let other = seed(&h, "other", MAZE).await;
    h.manager.start(UserId(1), maze.clone()).await.unwrap();
    h.manager.start(UserId(2), maze.clone()).await.unwrap();
    h.manager.start(UserId(3), other).await.unwrap();

    h.manager
        .replace_content(&maze, MAZE.as_bytes().to_vec())
        .await
        .unwrap();

    wait_for_notices(&h.sink, 2).await;
    let mut recipients: Vec<_> = h
        .sink
        .sent()
        .await
        .into_iter()
        .filter(|(_, notice)| matches!(notice, Notice::StoryUpdated { .. }))
        .map(|(user, _)| user)
        .collect();
    recipients.sort();
    assert_eq!(recipients, vec![UserId(1), UserId(2)]);
}

#[tokio::test]
async fn removed_content_tears_the_session_down() {
    let h = harness(EngineConfig::default());
    let maze = seed(&h, "maze", MAZE).await;
    h.manager.start(PLAYER, maze.clone()).await.unwrap();
    h.content.remove(&maze).await;

    let err = h.manager.advance(PLAYER, 0).await.unwrap_err();

    assert!(matches!(err.kind, SessionErrorKind::StoryNotContinueable));
    assert!(h.sessions.is_empty().await);
}

#[tokio::test]
async fn probe_has_no_session_side_effects() {
    let h = harness(EngineConfig::default());

    let report = h.manager.probe(MAZE.as_bytes()).unwrap();

    assert_eq!(report.result().lines.len(), 2);
    assert_eq!(report.result().choices.len(), 2);
    assert!(report.speakers().is_empty());
    assert!(h.sessions.is_empty().await);
    assert_eq!(settled_notice_count(&h.sink).await, 0);
}

#[tokio::test]
async fn probe_rejects_unparseable_content() {
    let h = harness(EngineConfig::default());
    let err = h.manager.probe(b"not [valid toml").unwrap_err();
    assert!(matches!(err.kind, SessionErrorKind::StoryNotStartable(_)));
}

//! Unified interface for the Fabula story-session engine.
//!
//! Re-exports the public surface of the workspace crates: the data model,
//! the runtime seam, the session engine, and the output packer. The `cli`
//! module backs the `fabula` binary.

pub mod cli;

pub use fabula_core::{
    AttributedMessage, ChatMessage, ChoiceControl, ControlRow, DiagnosticSeverity, PLAY_AGAIN_INDEX,
    PackLimits, PlainMessage, SpeakerProfile, SpeakerRegistry, StepDiagnostic, StepResult,
    StoryChoice, StoryId, StoryLine, UserId,
};
pub use fabula_engine::{
    ContentStore, EngineConfig, IssueClass, IssueDetector, IssueStore, LoopVerdict, Notice,
    NotificationSink, ProbeReport, SavedState, SessionError, SessionErrorKind, SessionManager,
    SessionRecord, SessionResult, SessionStore, memory, step,
};
pub use fabula_error::{FabulaError, FabulaErrorKind, FabulaResult};
pub use fabula_pack::pack;
pub use fabula_runtime::{
    DiagnosticSink, RuntimeFactory, ScriptedFactory, ScriptedRuntime, ScriptedStory, StoryRuntime,
};

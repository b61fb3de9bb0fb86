//! Core data types for the Fabula story-session engine.
//!
//! This crate provides the foundation data types shared by the runtime seam,
//! the session engine, and the output packer.

mod choice;
mod diagnostic;
mod ids;
mod limits;
mod line;
mod message;
mod speaker;
mod step_result;

pub use choice::StoryChoice;
pub use diagnostic::{DiagnosticSeverity, StepDiagnostic};
pub use ids::{StoryId, UserId};
pub use limits::PackLimits;
pub use line::{StoryLine, TAG_PAUSE, TAG_STANDALONE};
pub use message::{
    AttributedMessage, ChatMessage, ChoiceControl, ControlRow, PLAY_AGAIN_INDEX, PlainMessage,
};
pub use speaker::{SpeakerProfile, SpeakerRegistry};
pub use step_result::StepResult;

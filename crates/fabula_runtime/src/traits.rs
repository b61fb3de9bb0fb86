//! The interpreter seam: traits the engine drives a narrative through.

use crate::DiagnosticSink;
use fabula_core::{SpeakerRegistry, StoryChoice, StoryLine};
use fabula_error::{FabulaResult, RuntimeError};

/// A live narrative interpreter for one session.
///
/// Runtimes are driven cooperatively, one line per call; the caller owns the
/// wall-clock budget and stops pulling when it expires. Recoverable script
/// problems go into the registered [`DiagnosticSink`]; an `Err` return is
/// reserved for interpreter-internal failures.
pub trait StoryRuntime: Send {
    /// Registers the sink the runtime pushes warnings and errors into.
    ///
    /// Called by the stepper before the first [`Self::next_line`] pull;
    /// replaces any previously registered sink.
    fn register_sink(&mut self, sink: DiagnosticSink);

    /// True while the narrative can produce more lines without a choice.
    fn can_continue(&self) -> bool;

    /// Advances the narrative by one line.
    ///
    /// Returns `Ok(None)` when the runtime blocked on a choice set or
    /// reached the end mid-call.
    ///
    /// # Errors
    ///
    /// Returns an error on interpreter-internal failure; the stepper treats
    /// this as fatal for the step.
    fn next_line(&mut self) -> FabulaResult<Option<StoryLine>>;

    /// The choice set the narrative is currently blocked on.
    ///
    /// Empty while [`Self::can_continue`] is true and after the narrative
    /// ends.
    fn current_choices(&self) -> Vec<StoryChoice>;

    /// Applies the choice at `index` from the current choice set.
    ///
    /// Returns `Ok(false)` when the index is out of range or no choice set
    /// is pending; the narrative is not mutated in that case.
    ///
    /// # Errors
    ///
    /// Returns an error on interpreter-internal failure.
    fn choose(&mut self, index: usize) -> FabulaResult<bool>;

    /// Serializes the interpreter state for persistence.
    ///
    /// # Errors
    ///
    /// Returns an error when the state cannot be serialized.
    fn snapshot(&self) -> FabulaResult<Vec<u8>>;
}

/// Builds [`StoryRuntime`] instances from story content.
pub trait RuntimeFactory: Send + Sync {
    /// Builds a runtime positioned at the top of the story.
    ///
    /// # Errors
    ///
    /// Returns a `Parse` error when the content is unusable.
    fn fresh(&self, content: &[u8]) -> Result<Box<dyn StoryRuntime>, RuntimeError>;

    /// Rebuilds a runtime from content plus a persisted snapshot.
    ///
    /// # Errors
    ///
    /// Returns `Parse` when the content is unusable and `CorruptSnapshot`
    /// when the snapshot cannot be deserialized against it.
    fn restore(
        &self,
        content: &[u8],
        snapshot: &[u8],
    ) -> Result<Box<dyn StoryRuntime>, RuntimeError>;

    /// Builds the speaker lookup table for the content.
    ///
    /// Called once per content load; the result is reused for every pack.
    ///
    /// # Errors
    ///
    /// Returns an error when the content is unusable.
    fn speakers(&self, content: &[u8]) -> FabulaResult<SpeakerRegistry>;
}

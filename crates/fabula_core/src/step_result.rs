//! Result of one bounded step of a narrative runtime.

use crate::{StoryChoice, StoryLine};
use serde::{Deserialize, Serialize};

/// Everything one bounded step produced.
///
/// `complete == false` with empty `errors` means the wall-clock budget
/// interrupted the step. That is a distinct, non-fatal condition: the
/// session survives and the caller may let the user retry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StepResult {
    /// Narrative lines emitted during the step, in order
    pub lines: Vec<StoryLine>,
    /// Choices offered at the point the runtime blocked; empty on narrative
    /// end, budget exhaustion, and fatal errors
    pub choices: Vec<StoryChoice>,
    /// Warning diagnostics gathered during the step
    pub warnings: Vec<String>,
    /// Fatal diagnostics gathered during the step
    pub errors: Vec<String>,
    /// True when the narrative reached its natural end
    pub is_end: bool,
    /// False when the step was interrupted by the time budget
    pub complete: bool,
}

impl StepResult {
    /// A step that ran to a block point (choices pending) or to the end.
    pub fn completed(lines: Vec<StoryLine>, choices: Vec<StoryChoice>) -> Self {
        let is_end = choices.is_empty();
        Self {
            lines,
            choices,
            warnings: Vec::new(),
            errors: Vec::new(),
            is_end,
            complete: true,
        }
    }

    /// A step cut short by the wall-clock budget.
    pub fn interrupted(lines: Vec<StoryLine>) -> Self {
        Self {
            lines,
            complete: false,
            ..Self::default()
        }
    }

    /// A step stopped by fatal runtime diagnostics.
    pub fn failed(lines: Vec<StoryLine>, errors: Vec<String>) -> Self {
        Self {
            lines,
            errors,
            complete: true,
            ..Self::default()
        }
    }

    /// True when the step gathered at least one fatal diagnostic.
    pub fn has_fatal(&self) -> bool {
        !self.errors.is_empty()
    }

    /// The display text of the last `n` lines, oldest first.
    ///
    /// Used for owner diagnostics when a story misbehaves.
    pub fn recent_lines(&self, n: usize) -> Vec<String> {
        let skip = self.lines.len().saturating_sub(n);
        self.lines.iter().skip(skip).map(|l| l.text.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_with_no_choices_is_end() {
        let result = StepResult::completed(vec![StoryLine::new("fin")], Vec::new());
        assert!(result.is_end);
        assert!(result.complete);
    }

    #[test]
    fn completed_with_choices_is_not_end() {
        let choices = vec![StoryChoice::new(0, "Left"), StoryChoice::new(1, "Right")];
        let result = StepResult::completed(Vec::new(), choices);
        assert!(!result.is_end);
    }

    #[test]
    fn interrupted_is_not_fatal() {
        let result = StepResult::interrupted(vec![StoryLine::new("…")]);
        assert!(!result.complete);
        assert!(!result.has_fatal());
        assert!(!result.is_end);
    }

    #[test]
    fn recent_lines_keeps_tail() {
        let lines = (0..5).map(|i| StoryLine::new(format!("line {i}"))).collect();
        let result = StepResult::completed(lines, Vec::new());
        assert_eq!(result.recent_lines(2), vec!["line 3", "line 4"]);
        assert_eq!(result.recent_lines(10).len(), 5);
    }
}

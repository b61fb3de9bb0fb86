//! Bounded driving of a narrative runtime.

use fabula_core::StepResult;
use fabula_runtime::{DiagnosticSink, StoryRuntime};
use std::time::{Duration, Instant};

/// Drives one step of the runtime under a single wall-clock budget.
///
/// Registers a fresh diagnostic sink, then pulls lines one at a time. The
/// budget covers the entire step, not individual lines, and is enforced
/// cooperatively: the runtime must return control after every line for the
/// check to fire.
///
/// Outcomes, in order of precedence:
/// - a fatal diagnostic stops the step immediately; the result carries the
///   lines gathered so far plus the errors and offers no choices;
/// - the runtime signalling completion returns `complete = true` with the
///   pending choice set (an empty set means the narrative ended);
/// - budget exhaustion without fatal errors returns `complete = false` with
///   the gathered lines and no choices, a distinct, non-fatal condition.
pub fn step(runtime: &mut dyn StoryRuntime, budget: Duration) -> StepResult {
    let sink = DiagnosticSink::new();
    runtime.register_sink(sink.clone());

    let started = Instant::now();
    let mut lines = Vec::new();

    loop {
        if sink.has_fatal() {
            let (warnings, errors) = sink.drain();
            tracing::debug!(
                lines = lines.len(),
                errors = errors.len(),
                "step stopped by fatal diagnostics"
            );
            let mut result = StepResult::failed(lines, errors);
            result.warnings = warnings;
            return result;
        }

        if !runtime.can_continue() {
            let choices = runtime.current_choices();
            let (warnings, errors) = sink.drain();
            if !errors.is_empty() {
                let mut result = StepResult::failed(lines, errors);
                result.warnings = warnings;
                return result;
            }
            tracing::debug!(
                lines = lines.len(),
                choices = choices.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "step completed"
            );
            let mut result = StepResult::completed(lines, choices);
            result.warnings = warnings;
            return result;
        }

        if started.elapsed() >= budget {
            let (warnings, _) = sink.drain();
            tracing::warn!(
                lines = lines.len(),
                budget_ms = budget.as_millis() as u64,
                "step interrupted by time budget"
            );
            let mut result = StepResult::interrupted(lines);
            result.warnings = warnings;
            return result;
        }

        match runtime.next_line() {
            Ok(Some(line)) => lines.push(line),
            Ok(None) => {
                // Blocked on choices or finished mid-pull; the next
                // iteration re-checks can_continue and the sink.
            }
            Err(e) => {
                let (warnings, mut errors) = sink.drain();
                errors.push(e.to_string());
                let mut result = StepResult::failed(lines, errors);
                result.warnings = warnings;
                return result;
            }
        }
    }
}

//! Diagnostic sink shared between a runtime and the stepper.

use fabula_core::{DiagnosticSeverity, StepDiagnostic};
use std::sync::{Arc, Mutex};

/// Cloneable handle collecting diagnostics a runtime emits during a step.
///
/// The stepper registers a fresh sink on the runtime before driving it and
/// drains the sink afterwards. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticSink {
    buffer: Arc<Mutex<Vec<StepDiagnostic>>>,
}

impl DiagnosticSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a diagnostic.
    pub fn push(&self, diagnostic: StepDiagnostic) {
        self.buffer
            .lock()
            .expect("diagnostic sink lock poisoned")
            .push(diagnostic);
    }

    /// Records a warning diagnostic.
    pub fn warning(&self, message: impl Into<String>) {
        self.push(StepDiagnostic::warning(message));
    }

    /// Records a fatal diagnostic.
    pub fn error(&self, message: impl Into<String>) {
        self.push(StepDiagnostic::error(message));
    }

    /// True when a fatal diagnostic has arrived.
    pub fn has_fatal(&self) -> bool {
        self.buffer
            .lock()
            .expect("diagnostic sink lock poisoned")
            .iter()
            .any(StepDiagnostic::is_fatal)
    }

    /// Removes and returns all gathered diagnostics, split into warning and
    /// error messages.
    pub fn drain(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();
        let drained = std::mem::take(
            &mut *self
                .buffer
                .lock()
                .expect("diagnostic sink lock poisoned"),
        );
        for diagnostic in drained {
            match diagnostic.severity {
                DiagnosticSeverity::Warning => warnings.push(diagnostic.message),
                DiagnosticSeverity::Error => errors.push(diagnostic.message),
            }
        }
        (warnings, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_buffer() {
        let sink = DiagnosticSink::new();
        let clone = sink.clone();
        clone.warning("slow tag");
        clone.error("bad divert");

        assert!(sink.has_fatal());
        let (warnings, errors) = sink.drain();
        assert_eq!(warnings, vec!["slow tag"]);
        assert_eq!(errors, vec!["bad divert"]);
        assert!(!sink.has_fatal());
    }
}

//! Diagnostics emitted by a runtime during a step.

use serde::{Deserialize, Serialize};

/// Severity of a runtime diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticSeverity {
    /// Recoverable; the step keeps running
    Warning,
    /// Fatal; the step stops immediately
    Error,
}

/// A warning or error a runtime pushed into its diagnostic sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDiagnostic {
    /// Severity of the diagnostic
    pub severity: DiagnosticSeverity,
    /// Verbatim diagnostic text from the runtime
    pub message: String,
}

impl StepDiagnostic {
    /// Creates a warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            message: message.into(),
        }
    }

    /// Creates a fatal diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            message: message.into(),
        }
    }

    /// True when the severity is [`DiagnosticSeverity::Error`].
    pub fn is_fatal(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

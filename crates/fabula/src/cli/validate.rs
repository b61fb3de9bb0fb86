//! Validation command handler.

use super::{ValidationOutputFormat, memory_manager};
use fabula_engine::{EngineConfig, SessionErrorKind};
use std::path::PathBuf;

/// Handles the validate command.
///
/// Probes the script outside any session: builds a runtime, runs one
/// bounded step, and reports lines, choices, warnings, and errors.
///
/// Exit codes: 1 when the script has errors or cannot be parsed, 2 when
/// `--strict` is set and warnings were raised.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn handle_validate_command(
    path: PathBuf,
    format: ValidationOutputFormat,
    strict: bool,
) -> anyhow::Result<()> {
    tracing::info!("Starting validation");

    let content = std::fs::read(&path)?;
    let (manager, _) = memory_manager(EngineConfig::default());

    let report = match manager.probe(&content) {
        Ok(report) => report,
        Err(err) => {
            let detail = match err.kind {
                SessionErrorKind::StoryNotStartable(detail) => detail,
                other => other.to_string(),
            };
            match format {
                ValidationOutputFormat::Human => {
                    println!("❌ {}: {}", path.display(), detail);
                }
                ValidationOutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::json!({
                            "path": path.display().to_string(),
                            "valid": false,
                            "error": detail,
                        })
                    );
                }
            }
            std::process::exit(1);
        }
    };

    let result = report.result();
    let has_errors = result.has_fatal() || !result.complete;

    match format {
        ValidationOutputFormat::Human => {
            println!("Validated {}", path.display());
            println!("  Lines rendered: {}", result.lines.len());
            println!("  Choices offered: {}", result.choices.len());
            println!("  Speakers declared: {}", report.speakers().len());
            println!("  Probe time: {} ms", report.elapsed_ms());
            if !result.complete {
                println!("  ⚠️  The first step exceeded the time budget");
            }
            for warning in &result.warnings {
                println!("  Warning: {}", warning);
            }
            for error in &result.errors {
                println!("  Error: {}", error);
            }
            if has_errors {
                println!("\n❌ Validation failed");
            } else if !result.warnings.is_empty() {
                println!("\n⚠️  Validation passed with warnings");
            } else {
                println!("\n✅ Script is valid");
            }
        }
        ValidationOutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "path": path.display().to_string(),
                    "valid": !has_errors,
                    "lines": result.lines.len(),
                    "choices": result.choices.len(),
                    "speakers": report.speakers().len(),
                    "elapsed_ms": report.elapsed_ms(),
                    "warnings": result.warnings,
                    "errors": result.errors,
                    "complete": result.complete,
                })
            );
        }
    }

    if has_errors {
        std::process::exit(1);
    }
    if strict && !result.warnings.is_empty() {
        std::process::exit(2);
    }
    Ok(())
}

//! Engine configuration.

use fabula_core::PackLimits;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tunables for the session engine, loaded from a TOML file or defaulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Wall-clock budget for one step, in milliseconds
    #[serde(default = "default_step_budget_ms")]
    pub step_budget_ms: u64,
    /// Incomplete steps a story may accumulate before it is flagged as
    /// looping; the count may reach this value, exceeding it escalates
    #[serde(default = "default_loop_threshold")]
    pub loop_threshold: u32,
    /// Rendered lines included in owner diagnostics
    #[serde(default = "default_diagnostic_lines")]
    pub diagnostic_lines: usize,
    /// Message and control-grid limits used for packing and for the
    /// choice-overflow check
    #[serde(default)]
    pub limits: PackLimits,
}

fn default_step_budget_ms() -> u64 {
    900
}

fn default_loop_threshold() -> u32 {
    3
}

fn default_diagnostic_lines() -> usize {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_budget_ms: default_step_budget_ms(),
            loop_threshold: default_loop_threshold(),
            diagnostic_lines: default_diagnostic_lines(),
            limits: PackLimits::default(),
        }
    }
}

impl EngineConfig {
    /// Load engine configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or the TOML is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// The step budget as a [`Duration`].
    pub fn step_budget(&self) -> Duration {
        Duration::from_millis(self.step_budget_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = EngineConfig::default();
        assert_eq!(config.step_budget(), Duration::from_millis(900));
        assert_eq!(config.loop_threshold, 3);
        assert_eq!(config.limits.max_controls(), 25);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: EngineConfig = toml::from_str("step_budget_ms = 100").unwrap();
        assert_eq!(config.step_budget_ms, 100);
        assert_eq!(config.loop_threshold, 3);
    }
}

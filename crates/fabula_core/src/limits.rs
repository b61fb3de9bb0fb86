//! Size limits for packed messages and control grids.

use serde::{Deserialize, Serialize};

/// Size-limit configuration for the output packer.
///
/// Defaults are shaped after Discord: 2000-character messages, 80-character
/// button labels, five buttons per row, five rows per message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackLimits {
    /// Maximum characters in a plain message
    #[serde(default = "default_plain_limit")]
    pub plain_limit: usize,
    /// Maximum characters in a speaker-attributed message
    #[serde(default = "default_attributed_limit")]
    pub attributed_limit: usize,
    /// Maximum characters in a control label
    #[serde(default = "default_control_label_limit")]
    pub control_label_limit: usize,
    /// Controls per row in the control grid
    #[serde(default = "default_controls_per_row")]
    pub controls_per_row: usize,
    /// Rows in the control grid
    #[serde(default = "default_control_rows")]
    pub control_rows: usize,
}

fn default_plain_limit() -> usize {
    2000
}

fn default_attributed_limit() -> usize {
    2000
}

fn default_control_label_limit() -> usize {
    80
}

fn default_controls_per_row() -> usize {
    5
}

fn default_control_rows() -> usize {
    5
}

impl Default for PackLimits {
    fn default() -> Self {
        Self {
            plain_limit: default_plain_limit(),
            attributed_limit: default_attributed_limit(),
            control_label_limit: default_control_label_limit(),
            controls_per_row: default_controls_per_row(),
            control_rows: default_control_rows(),
        }
    }
}

impl PackLimits {
    /// Maximum number of deliverable controls: row capacity times row count.
    pub fn max_controls(&self) -> usize {
        self.controls_per_row * self.control_rows
    }
}

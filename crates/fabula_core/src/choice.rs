//! Player choices offered by a runtime.

use serde::{Deserialize, Serialize};

/// One selectable choice at a branch point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryChoice {
    /// Position of the choice in the runtime's current choice set
    pub index: usize,
    /// Display text for the choice
    pub text: String,
    /// Optional style hint attached by the script (e.g. button color)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_tag: Option<String>,
}

impl StoryChoice {
    /// Creates an unstyled choice.
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            style_tag: None,
        }
    }

    /// Sets the style hint.
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style_tag = Some(style.into());
        self
    }
}

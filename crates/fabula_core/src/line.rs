//! Rendered narrative lines.

use serde::{Deserialize, Serialize};

/// Tag marking a line that forces a pacing break before itself.
pub const TAG_PAUSE: &str = "pause";

/// Tag marking a line that must occupy its own message.
pub const TAG_STANDALONE: &str = "standalone";

/// One line of narrative output emitted by a runtime during a step.
///
/// Tags are free-form strings attached by the script author; the packer
/// understands [`TAG_PAUSE`] and [`TAG_STANDALONE`], everything else passes
/// through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryLine {
    /// The rendered text
    pub text: String,
    /// Tags attached to this line by the script
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl StoryLine {
    /// Creates an untagged line.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tags: Vec::new(),
        }
    }

    /// Creates a line carrying the given tags.
    pub fn with_tags(text: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            text: text.into(),
            tags,
        }
    }

    /// True when the line carries the given tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// True when the line forces a pacing break.
    pub fn is_pause(&self) -> bool {
        self.has_tag(TAG_PAUSE)
    }

    /// True when the line must occupy its own message.
    pub fn is_standalone(&self) -> bool {
        self.has_tag(TAG_STANDALONE)
    }
}

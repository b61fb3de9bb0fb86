//! Platform-agnostic deliverable chat messages.
//!
//! The packer turns a [`crate::StepResult`] into a sequence of these;
//! a delivery adapter maps them onto whatever the chat platform supports.

use crate::SpeakerProfile;
use serde::{Deserialize, Serialize};

/// Control index reserved for the "play again" control on a closing message.
///
/// Callers translate a press of this control into a `restart` operation.
pub const PLAY_AGAIN_INDEX: usize = usize::MAX;

/// One interactive control (button) offering a choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceControl {
    /// Choice index to submit when pressed
    pub index: usize,
    /// Button label
    pub label: String,
    /// Optional style hint carried over from the choice's style tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl ChoiceControl {
    /// Creates an unstyled control.
    pub fn new(index: usize, label: impl Into<String>) -> Self {
        Self {
            index,
            label: label.into(),
            style: None,
        }
    }
}

/// One row of controls in the control grid.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ControlRow(pub Vec<ChoiceControl>);

/// Plain chat message: unattributed text, optionally carrying controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlainMessage {
    /// Message text
    pub text: String,
    /// Control grid attached to this message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub controls: Vec<ControlRow>,
}

/// Rich chat message attributed to a speaking character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributedMessage {
    /// The speaker this message is rendered as
    pub speaker: SpeakerProfile,
    /// Message text (without the attribution prefix)
    pub text: String,
    /// Control grid attached to this message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub controls: Vec<ControlRow>,
}

/// A deliverable chat payload or a pacing marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatMessage {
    /// Unattributed text message
    Plain(PlainMessage),
    /// Speaker-attributed rich message
    Attributed(AttributedMessage),
    /// Content-less pacing marker between groups; never carries controls
    /// and is exempt from size limits
    Pacing,
}

impl ChatMessage {
    /// Creates a plain message with no controls.
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain(PlainMessage {
            text: text.into(),
            controls: Vec::new(),
        })
    }

    /// Creates an attributed message with no controls.
    pub fn attributed(speaker: SpeakerProfile, text: impl Into<String>) -> Self {
        Self::Attributed(AttributedMessage {
            speaker,
            text: text.into(),
            controls: Vec::new(),
        })
    }

    /// The message text, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            ChatMessage::Plain(m) => Some(&m.text),
            ChatMessage::Attributed(m) => Some(&m.text),
            ChatMessage::Pacing => None,
        }
    }

    /// The attached control grid; empty for pacing markers.
    pub fn controls(&self) -> &[ControlRow] {
        match self {
            ChatMessage::Plain(m) => &m.controls,
            ChatMessage::Attributed(m) => &m.controls,
            ChatMessage::Pacing => &[],
        }
    }

    /// True for the pacing marker.
    pub fn is_pacing(&self) -> bool {
        matches!(self, ChatMessage::Pacing)
    }

    /// True when at least one control is attached.
    pub fn has_controls(&self) -> bool {
        self.controls().iter().any(|row| !row.0.is_empty())
    }

    /// Total number of attached controls across all rows.
    pub fn control_count(&self) -> usize {
        self.controls().iter().map(|row| row.0.len()).sum()
    }
}

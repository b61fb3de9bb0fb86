//! Speaker attribution for narrative lines.
//!
//! Scripts attribute dialogue with a `Name: text` prefix. The registry is a
//! parsed lookup table built once per content load; matching is a plain
//! string-prefix comparison, not dynamic dispatch.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Display profile for one speaking character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_builder::Builder)]
pub struct SpeakerProfile {
    /// Display name; also the attribution prefix matched in lines
    #[builder(setter(into))]
    pub name: String,
    /// Optional avatar image URL for rich attribution
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Optional accent color or style hint
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent: Option<String>,
}

impl SpeakerProfile {
    /// Creates a profile with only a display name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            avatar_url: None,
            accent: None,
        }
    }
}

/// Lookup table mapping attribution prefixes to speaker profiles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakerRegistry {
    profiles: HashMap<String, SpeakerProfile>,
}

impl SpeakerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from a list of profiles, keyed by display name.
    pub fn from_profiles(profiles: impl IntoIterator<Item = SpeakerProfile>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|p| (p.name.clone(), p))
                .collect(),
        }
    }

    /// Registers a profile, replacing any previous entry with the same name.
    pub fn insert(&mut self, profile: SpeakerProfile) {
        self.profiles.insert(profile.name.clone(), profile);
    }

    /// Number of registered speakers.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// True when no speakers are registered.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Looks up a profile by display name.
    pub fn get(&self, name: &str) -> Option<&SpeakerProfile> {
        self.profiles.get(name)
    }

    /// Splits a `Name: text` line into its registered speaker and the spoken
    /// text, when the prefix matches a registered name.
    ///
    /// Unattributed narration (no colon, or an unregistered prefix) returns
    /// `None`.
    pub fn split_attribution<'a>(&self, line: &'a str) -> Option<(&SpeakerProfile, &'a str)> {
        let (prefix, rest) = line.split_once(':')?;
        let profile = self.profiles.get(prefix.trim_end())?;
        Some((profile, rest.trim_start()))
    }
}

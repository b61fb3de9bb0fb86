//! TOML-scripted reference runtime.
//!
//! Scripts are TOML documents: `[story]` metadata, optional `[speakers.*]`
//! profiles, and `[nodes.*]` holding `lines` plus either a `choices` array,
//! a `goto` chain, or nothing (narrative end). The `loop_forever` node flag
//! replays the node's lines endlessly and exists to exercise the engine's
//! budget handling against runaway scripts.
//!
//! ```toml
//! [story]
//! title = "The Maze"
//! start = "entrance"
//!
//! [speakers.guide]
//! name = "Guide"
//! accent = "teal"
//!
//! [nodes.entrance]
//! lines = ["You stand at the mouth of a maze.", "Guide: Ready?"]
//! choices = [
//!   { text = "Left", goto = "left_hall" },
//!   { text = "Right", goto = "right_hall", style = "danger" },
//! ]
//! ```

use crate::{DiagnosticSink, RuntimeFactory, StoryRuntime};
use fabula_core::{SpeakerProfile, SpeakerRegistry, StoryChoice, StoryLine};
use fabula_error::{FabulaResult, JsonError, RuntimeError, RuntimeErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Snapshot document version written by [`ScriptedRuntime::snapshot`].
const SNAPSHOT_FORMAT: u32 = 1;

#[derive(Debug, Clone, Deserialize)]
struct ScriptDoc {
    story: StoryMetaSpec,
    #[serde(default)]
    speakers: HashMap<String, SpeakerSpec>,
    #[serde(default)]
    nodes: HashMap<String, NodeSpec>,
}

#[derive(Debug, Clone, Deserialize)]
struct StoryMetaSpec {
    title: String,
    #[serde(default = "default_start")]
    start: String,
}

fn default_start() -> String {
    "start".to_string()
}

#[derive(Debug, Clone, Deserialize)]
struct SpeakerSpec {
    /// Display name; defaults to the table key
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
    #[serde(default)]
    accent: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct NodeSpec {
    #[serde(default)]
    lines: Vec<LineSpec>,
    #[serde(default)]
    choices: Vec<ChoiceSpec>,
    #[serde(default)]
    goto: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
    #[serde(default)]
    loop_forever: bool,
}

/// A line is either a bare string or a table carrying tags.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum LineSpec {
    Text(String),
    Tagged {
        text: String,
        #[serde(default)]
        tags: Vec<String>,
    },
}

impl From<LineSpec> for StoryLine {
    fn from(spec: LineSpec) -> Self {
        match spec {
            LineSpec::Text(text) => StoryLine::new(text),
            LineSpec::Tagged { text, tags } => StoryLine::with_tags(text, tags),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceSpec {
    text: String,
    goto: String,
    #[serde(default)]
    style: Option<String>,
}

#[derive(Debug, Clone)]
struct Node {
    lines: Vec<StoryLine>,
    choices: Vec<ScriptedChoice>,
    goto: Option<String>,
    warnings: Vec<String>,
    loop_forever: bool,
}

#[derive(Debug, Clone)]
struct ScriptedChoice {
    text: String,
    goto: String,
    style: Option<String>,
}

/// A parsed and validated script.
#[derive(Debug, Clone)]
pub struct ScriptedStory {
    title: String,
    start: String,
    speakers: SpeakerRegistry,
    nodes: HashMap<String, Node>,
}

impl ScriptedStory {
    /// Parses script bytes into a validated story.
    ///
    /// Structural validation covers what a runtime cannot recover from:
    /// well-formed TOML, at least one node, and an existing start node.
    /// Dangling `goto` targets surface later as fatal step diagnostics,
    /// matching how embedded interpreters report bad diverts.
    ///
    /// # Errors
    ///
    /// Returns a `Parse` error naming the first structural problem.
    pub fn parse(content: &[u8]) -> Result<Self, RuntimeError> {
        let text = std::str::from_utf8(content)
            .map_err(|e| RuntimeError::new(RuntimeErrorKind::Parse(format!("not UTF-8: {e}"))))?;
        let doc: ScriptDoc = toml::from_str(text)
            .map_err(|e| RuntimeError::new(RuntimeErrorKind::Parse(e.to_string())))?;

        if doc.nodes.is_empty() {
            return Err(RuntimeError::new(RuntimeErrorKind::Parse(
                "story has no nodes".to_string(),
            )));
        }
        if !doc.nodes.contains_key(&doc.story.start) {
            return Err(RuntimeError::new(RuntimeErrorKind::Parse(format!(
                "start node '{}' does not exist",
                doc.story.start
            ))));
        }

        let speakers = SpeakerRegistry::from_profiles(doc.speakers.into_iter().map(
            |(key, spec)| SpeakerProfile {
                name: spec.name.unwrap_or(key),
                avatar_url: spec.avatar_url,
                accent: spec.accent,
            },
        ));

        let nodes = doc
            .nodes
            .into_iter()
            .map(|(name, spec)| {
                let node = Node {
                    lines: spec.lines.into_iter().map(StoryLine::from).collect(),
                    choices: spec
                        .choices
                        .into_iter()
                        .map(|c| ScriptedChoice {
                            text: c.text,
                            goto: c.goto,
                            style: c.style,
                        })
                        .collect(),
                    goto: spec.goto,
                    warnings: spec.warnings,
                    loop_forever: spec.loop_forever,
                };
                (name, node)
            })
            .collect();

        Ok(Self {
            title: doc.story.title,
            start: doc.story.start,
            speakers,
            nodes,
        })
    }

    /// Story title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Name of the start node.
    pub fn start(&self) -> &str {
        &self.start
    }

    /// The speaker lookup table declared by the script.
    pub fn speakers(&self) -> &SpeakerRegistry {
        &self.speakers
    }
}

/// Interpreter state document persisted between steps.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotDoc {
    format: u32,
    node: String,
    cursor: usize,
    finished: bool,
}

/// Reference [`StoryRuntime`] walking a [`ScriptedStory`].
#[derive(Debug)]
pub struct ScriptedRuntime {
    story: Arc<ScriptedStory>,
    sink: DiagnosticSink,
    node: String,
    cursor: usize,
    finished: bool,
    entered: bool,
}

impl ScriptedRuntime {
    /// Builds a runtime positioned at the story's start node.
    pub fn fresh(story: Arc<ScriptedStory>) -> Self {
        let node = story.start.clone();
        Self {
            story,
            sink: DiagnosticSink::new(),
            node,
            cursor: 0,
            finished: false,
            entered: false,
        }
    }

    /// Rebuilds a runtime from a snapshot document.
    ///
    /// # Errors
    ///
    /// Returns `CorruptSnapshot` when the bytes do not decode, the format
    /// version is unknown, or the referenced node no longer exists in the
    /// story.
    pub fn restore(story: Arc<ScriptedStory>, snapshot: &[u8]) -> Result<Self, RuntimeError> {
        let doc: SnapshotDoc = serde_json::from_slice(snapshot).map_err(|e| {
            RuntimeError::new(RuntimeErrorKind::CorruptSnapshot(e.to_string()))
        })?;
        if doc.format != SNAPSHOT_FORMAT {
            return Err(RuntimeError::new(RuntimeErrorKind::CorruptSnapshot(
                format!("unknown snapshot format {}", doc.format),
            )));
        }
        let Some(node) = story.nodes.get(&doc.node) else {
            return Err(RuntimeError::new(RuntimeErrorKind::CorruptSnapshot(
                format!("snapshot references unknown node '{}'", doc.node),
            )));
        };
        if doc.cursor > node.lines.len() {
            return Err(RuntimeError::new(RuntimeErrorKind::CorruptSnapshot(
                format!(
                    "snapshot cursor {} out of range for node '{}'",
                    doc.cursor, doc.node
                ),
            )));
        }
        Ok(Self {
            story,
            sink: DiagnosticSink::new(),
            entered: doc.cursor > 0,
            node: doc.node,
            cursor: doc.cursor,
            finished: doc.finished,
        })
    }

    fn current_node(&self) -> Option<&Node> {
        self.story.nodes.get(&self.node)
    }
}

impl StoryRuntime for ScriptedRuntime {
    fn register_sink(&mut self, sink: DiagnosticSink) {
        self.sink = sink;
    }

    fn can_continue(&self) -> bool {
        if self.finished {
            return false;
        }
        let Some(node) = self.current_node() else {
            // Missing node is reported as a fatal diagnostic on the next pull.
            return true;
        };
        if self.cursor < node.lines.len() {
            return true;
        }
        if node.loop_forever && !node.lines.is_empty() {
            return true;
        }
        node.goto.is_some()
    }

    fn next_line(&mut self) -> FabulaResult<Option<StoryLine>> {
        loop {
            if self.finished {
                return Ok(None);
            }
            let Some(node) = self.story.nodes.get(&self.node) else {
                self.sink
                    .error(format!("divert to missing node '{}'", self.node));
                self.finished = true;
                return Ok(None);
            };
            if !self.entered {
                for warning in &node.warnings {
                    self.sink.warning(warning.clone());
                }
                self.entered = true;
            }
            if self.cursor < node.lines.len() {
                let line = node.lines[self.cursor].clone();
                self.cursor += 1;
                return Ok(Some(line));
            }
            if node.loop_forever && !node.lines.is_empty() {
                self.cursor = 0;
                continue;
            }
            if let Some(target) = &node.goto {
                tracing::trace!(from = %self.node, to = %target, "following divert");
                self.node = target.clone();
                self.cursor = 0;
                self.entered = false;
                continue;
            }
            // Blocked on choices, or at the narrative end.
            return Ok(None);
        }
    }

    fn current_choices(&self) -> Vec<StoryChoice> {
        if self.finished {
            return Vec::new();
        }
        let Some(node) = self.current_node() else {
            return Vec::new();
        };
        if self.cursor < node.lines.len() || node.loop_forever || node.goto.is_some() {
            return Vec::new();
        }
        node.choices
            .iter()
            .enumerate()
            .map(|(index, choice)| {
                let mut story_choice = StoryChoice::new(index, choice.text.clone());
                story_choice.style_tag = choice.style.clone();
                story_choice
            })
            .collect()
    }

    fn choose(&mut self, index: usize) -> FabulaResult<bool> {
        let pending = self.current_choices();
        if index >= pending.len() {
            return Ok(false);
        }
        let target = match self.current_node() {
            Some(node) => node.choices[index].goto.clone(),
            None => return Ok(false),
        };
        self.node = target;
        self.cursor = 0;
        self.entered = false;
        self.finished = false;
        Ok(true)
    }

    fn snapshot(&self) -> FabulaResult<Vec<u8>> {
        let doc = SnapshotDoc {
            format: SNAPSHOT_FORMAT,
            node: self.node.clone(),
            cursor: self.cursor,
            finished: self.finished,
        };
        serde_json::to_vec(&doc).map_err(|e| JsonError::new(e.to_string()).into())
    }
}

/// Factory building [`ScriptedRuntime`] instances from TOML script bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptedFactory;

impl ScriptedFactory {
    /// Creates a scripted runtime factory.
    pub fn new() -> Self {
        Self
    }
}

impl RuntimeFactory for ScriptedFactory {
    fn fresh(&self, content: &[u8]) -> Result<Box<dyn StoryRuntime>, RuntimeError> {
        let story = Arc::new(ScriptedStory::parse(content)?);
        Ok(Box::new(ScriptedRuntime::fresh(story)))
    }

    fn restore(
        &self,
        content: &[u8],
        snapshot: &[u8],
    ) -> Result<Box<dyn StoryRuntime>, RuntimeError> {
        let story = Arc::new(ScriptedStory::parse(content)?);
        Ok(Box::new(ScriptedRuntime::restore(story, snapshot)?))
    }

    fn speakers(&self, content: &[u8]) -> FabulaResult<SpeakerRegistry> {
        let story = ScriptedStory::parse(content)?;
        Ok(story.speakers.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAZE: &str = r#"
        [story]
        title = "The Maze"
        start = "entrance"

        [speakers.guide]
        name = "Guide"
        accent = "teal"

        [nodes.entrance]
        lines = ["You stand at the mouth of a maze.", "Guide: Ready?"]
        choices = [
            { text = "Left", goto = "left_hall" },
            { text = "Right", goto = "right_hall", style = "danger" },
        ]

        [nodes.left_hall]
        lines = ["A cold draft."]
        goto = "finale"

        [nodes.right_hall]
        lines = ["A warm glow."]

        [nodes.finale]
        lines = ["You step into daylight."]
    "#;

    fn story() -> Arc<ScriptedStory> {
        Arc::new(ScriptedStory::parse(MAZE.as_bytes()).unwrap())
    }

    #[test]
    fn parses_metadata_and_speakers() {
        let story = story();
        assert_eq!(story.title(), "The Maze");
        assert_eq!(story.start(), "entrance");
        assert_eq!(story.speakers().len(), 1);
        assert!(story.speakers().get("Guide").is_some());
    }

    #[test]
    fn missing_start_node_is_a_parse_error() {
        let toml = r#"
            [story]
            title = "Broken"
            start = "nowhere"

            [nodes.somewhere]
            lines = ["hi"]
        "#;
        let err = ScriptedStory::parse(toml.as_bytes()).unwrap_err();
        assert!(err.is_parse());
        assert!(err.kind.to_string().contains("nowhere"));
    }

    #[test]
    fn empty_story_is_a_parse_error() {
        let toml = r#"
            [story]
            title = "Empty"
        "#;
        assert!(ScriptedStory::parse(toml.as_bytes()).unwrap_err().is_parse());
    }

    #[test]
    fn walks_lines_then_blocks_on_choices() {
        let mut runtime = ScriptedRuntime::fresh(story());
        assert!(runtime.can_continue());
        assert_eq!(
            runtime.next_line().unwrap().unwrap().text,
            "You stand at the mouth of a maze."
        );
        assert_eq!(runtime.next_line().unwrap().unwrap().text, "Guide: Ready?");
        assert!(runtime.next_line().unwrap().is_none());
        assert!(!runtime.can_continue());

        let choices = runtime.current_choices();
        assert_eq!(choices.len(), 2);
        assert_eq!(choices[0].text, "Left");
        assert_eq!(choices[1].style_tag.as_deref(), Some("danger"));
    }

    #[test]
    fn choose_follows_divert_chains() {
        let mut runtime = ScriptedRuntime::fresh(story());
        while runtime.next_line().unwrap().is_some() {}
        assert!(runtime.choose(0).unwrap());

        // left_hall diverts into finale without another choice.
        let mut texts = Vec::new();
        while let Some(line) = runtime.next_line().unwrap() {
            texts.push(line.text);
        }
        assert_eq!(texts, vec!["A cold draft.", "You step into daylight."]);
        assert!(runtime.current_choices().is_empty());
        assert!(!runtime.can_continue());
    }

    #[test]
    fn out_of_range_choice_is_rejected_without_mutation() {
        let mut runtime = ScriptedRuntime::fresh(story());
        while runtime.next_line().unwrap().is_some() {}
        assert!(!runtime.choose(5).unwrap());
        assert_eq!(runtime.current_choices().len(), 2);
    }

    #[test]
    fn snapshot_round_trip_resumes_in_place() {
        let mut runtime = ScriptedRuntime::fresh(story());
        runtime.next_line().unwrap();
        let snapshot = runtime.snapshot().unwrap();

        let mut restored = ScriptedRuntime::restore(story(), &snapshot).unwrap();
        assert_eq!(restored.next_line().unwrap().unwrap().text, "Guide: Ready?");
    }

    #[test]
    fn garbage_snapshot_is_corrupt() {
        let err = ScriptedRuntime::restore(story(), b"not json").unwrap_err();
        assert!(err.is_corrupt_snapshot());
    }

    #[test]
    fn snapshot_for_removed_node_is_corrupt() {
        let snapshot =
            serde_json::to_vec(&SnapshotDoc {
                format: SNAPSHOT_FORMAT,
                node: "demolished".to_string(),
                cursor: 0,
                finished: false,
            })
            .unwrap();
        let err = ScriptedRuntime::restore(story(), &snapshot).unwrap_err();
        assert!(err.is_corrupt_snapshot());
    }

    #[test]
    fn dangling_divert_is_a_fatal_diagnostic() {
        let toml = r#"
            [story]
            title = "Dangle"
            start = "a"

            [nodes.a]
            lines = ["one"]
            goto = "ghost"
        "#;
        let story = Arc::new(ScriptedStory::parse(toml.as_bytes()).unwrap());
        let mut runtime = ScriptedRuntime::fresh(story);
        let sink = DiagnosticSink::new();
        runtime.register_sink(sink.clone());

        assert_eq!(runtime.next_line().unwrap().unwrap().text, "one");
        assert!(runtime.next_line().unwrap().is_none());
        assert!(sink.has_fatal());
        assert!(!runtime.can_continue());
    }

    #[test]
    fn loop_forever_never_runs_dry() {
        let toml = r#"
            [story]
            title = "Spin"
            start = "spin"

            [nodes.spin]
            lines = ["round", "and round"]
            loop_forever = true
        "#;
        let story = Arc::new(ScriptedStory::parse(toml.as_bytes()).unwrap());
        let mut runtime = ScriptedRuntime::fresh(story);
        for _ in 0..100 {
            assert!(runtime.next_line().unwrap().is_some());
        }
        assert!(runtime.can_continue());
    }

    #[test]
    fn node_warnings_reach_the_sink_once() {
        let toml = r#"
            [story]
            title = "Warny"
            start = "a"

            [nodes.a]
            lines = ["one", "two"]
            warnings = ["deprecated syntax near line 3"]
        "#;
        let story = Arc::new(ScriptedStory::parse(toml.as_bytes()).unwrap());
        let mut runtime = ScriptedRuntime::fresh(story);
        let sink = DiagnosticSink::new();
        runtime.register_sink(sink.clone());
        while runtime.next_line().unwrap().is_some() {}

        let (warnings, errors) = sink.drain();
        assert_eq!(warnings, vec!["deprecated syntax near line 3"]);
        assert!(errors.is_empty());
    }
}

//! Step-result to chat-message packing.

use crate::split::split_long_line;
use fabula_core::{
    AttributedMessage, ChatMessage, ChoiceControl, ControlRow, PLAY_AGAIN_INDEX, PackLimits,
    PlainMessage, SpeakerProfile, SpeakerRegistry, StepResult, StoryChoice,
};

/// Packs one step's output into deliverable chat messages.
///
/// Pure and deterministic: identical inputs, including the limit
/// configuration, always yield an identical message sequence. Rules, in
/// precedence order:
///
/// 1. consecutive lines attributed to the same registered speaker merge into
///    one rich message; any speaker change, including to or from plain
///    narration, breaks the group;
/// 2. a `pause`-tagged line breaks before itself and leaves a content-less
///    pacing marker between the groups;
/// 3. a `standalone`-tagged line, or one containing a bare URL, occupies its
///    own message, breaking before and after;
/// 4. within a group, lines join with newlines up to the size limit of the
///    message kind; an over-limit line splits at whitespace, preferring line
///    breaks, then other whitespace, then a hard cut;
/// 5. choice controls attach to the last plain message; without one, or when
///    a label exceeds the control-label limit, a numbered listing message is
///    appended to carry them;
/// 6. controls beyond the row-capacity × row-count grid are dropped, with a
///    single trailing warning message noting the configured maximum;
/// 7. a narrative end appends a closing message with a "play again" control.
pub fn pack(
    result: &StepResult,
    speakers: &SpeakerRegistry,
    limits: &PackLimits,
) -> Vec<ChatMessage> {
    tracing::debug!(
        lines = result.lines.len(),
        choices = result.choices.len(),
        is_end = result.is_end,
        "packing step result"
    );

    let mut packer = Packer::new(speakers, limits);
    for line in &result.lines {
        packer.push_line(line);
    }
    let mut messages = packer.finish();

    attach_choices(&mut messages, &result.choices, limits);

    if result.is_end {
        let mut closing = PlainMessage {
            text: "The story has ended. Thanks for playing!".to_string(),
            controls: Vec::new(),
        };
        closing.controls.push(ControlRow(vec![ChoiceControl {
            index: PLAY_AGAIN_INDEX,
            label: "Play again".to_string(),
            style: None,
        }]));
        messages.push(ChatMessage::Plain(closing));
    }

    messages
}

/// Accumulates lines into speaker groups under the size limits.
struct Packer<'a> {
    speakers: &'a SpeakerRegistry,
    limits: &'a PackLimits,
    out: Vec<ChatMessage>,
    group_speaker: Option<SpeakerProfile>,
    group_text: String,
}

impl<'a> Packer<'a> {
    fn new(speakers: &'a SpeakerRegistry, limits: &'a PackLimits) -> Self {
        Self {
            speakers,
            limits,
            out: Vec::new(),
            group_speaker: None,
            group_text: String::new(),
        }
    }

    fn limit_for(&self, speaker: Option<&SpeakerProfile>) -> usize {
        if speaker.is_some() {
            self.limits.attributed_limit
        } else {
            self.limits.plain_limit
        }
    }

    fn emit(&mut self, speaker: Option<&SpeakerProfile>, text: String) {
        let message = match speaker {
            Some(profile) => ChatMessage::Attributed(AttributedMessage {
                speaker: profile.clone(),
                text,
                controls: Vec::new(),
            }),
            None => ChatMessage::Plain(PlainMessage {
                text,
                controls: Vec::new(),
            }),
        };
        self.out.push(message);
    }

    /// Flushes the accumulated group, if any, as one message.
    fn flush(&mut self) {
        if self.group_text.is_empty() {
            self.group_speaker = None;
            return;
        }
        let text = std::mem::take(&mut self.group_text);
        let speaker = self.group_speaker.take();
        self.emit(speaker.as_ref(), text);
    }

    /// Inserts a pacing marker between groups; never first, never doubled.
    fn pacing_break(&mut self) {
        self.flush();
        if matches!(self.out.last(), Some(m) if !m.is_pacing()) {
            self.out.push(ChatMessage::Pacing);
        }
    }

    fn push_line(&mut self, line: &fabula_core::StoryLine) {
        if line.is_pause() {
            self.pacing_break();
        }

        let (speaker, spoken) = match self.speakers.split_attribution(&line.text) {
            Some((profile, rest)) => (Some(profile.clone()), rest.to_string()),
            None => (None, line.text.clone()),
        };

        if line.is_standalone() || contains_bare_url(&spoken) {
            self.flush();
            let limit = self.limit_for(speaker.as_ref());
            for fragment in split_long_line(&spoken, limit) {
                self.emit(speaker.as_ref(), fragment);
            }
            return;
        }

        if spoken.trim().is_empty() {
            return;
        }

        if !self.group_text.is_empty() && self.group_speaker != speaker {
            self.flush();
        }

        let limit = self.limit_for(speaker.as_ref());
        let joined_len = if self.group_text.is_empty() {
            spoken.chars().count()
        } else {
            self.group_text.chars().count() + 1 + spoken.chars().count()
        };

        if joined_len <= limit {
            if !self.group_text.is_empty() {
                self.group_text.push('\n');
            }
            self.group_text.push_str(&spoken);
            self.group_speaker = speaker;
            return;
        }

        // The next line would overflow: flush and start over with it.
        self.flush();
        if spoken.chars().count() <= limit {
            self.group_text = spoken;
            self.group_speaker = speaker;
            return;
        }

        // A single over-limit line: all but the last fragment become their
        // own messages, the last fragment keeps accumulating.
        let mut fragments = split_long_line(&spoken, limit);
        let last = fragments.pop().unwrap_or_default();
        for fragment in fragments {
            self.emit(speaker.as_ref(), fragment);
        }
        self.group_text = last;
        self.group_speaker = speaker;
    }

    fn finish(mut self) -> Vec<ChatMessage> {
        self.flush();
        self.out
    }
}

/// True when any whitespace-separated token is a bare URL.
fn contains_bare_url(text: &str) -> bool {
    text.split_whitespace()
        .any(|token| token.starts_with("http://") || token.starts_with("https://"))
}

/// Keeps the first `limit` characters of a label.
fn truncate_label(label: &str, limit: usize) -> String {
    label.chars().take(limit).collect()
}

/// Attaches choice controls per rules 5 and 6.
fn attach_choices(messages: &mut Vec<ChatMessage>, choices: &[StoryChoice], limits: &PackLimits) {
    if choices.is_empty() {
        return;
    }

    let capacity = limits.max_controls();
    let deliverable = &choices[..choices.len().min(capacity)];
    let dropped = choices.len().saturating_sub(capacity);

    let labels_fit = deliverable
        .iter()
        .all(|c| c.text.chars().count() <= limits.control_label_limit);
    let last_plain = messages
        .iter()
        .rposition(|m| matches!(m, ChatMessage::Plain(_)));

    let rows = |controls: Vec<ChoiceControl>| -> Vec<ControlRow> {
        controls
            .chunks(limits.controls_per_row.max(1))
            .map(|chunk| ControlRow(chunk.to_vec()))
            .collect()
    };

    match (labels_fit, last_plain) {
        (true, Some(at)) => {
            let controls = deliverable
                .iter()
                .map(|c| ChoiceControl {
                    index: c.index,
                    label: c.text.clone(),
                    style: c.style_tag.clone(),
                })
                .collect();
            if let ChatMessage::Plain(message) = &mut messages[at] {
                message.controls = rows(controls);
            }
        }
        _ => {
            // Numbered listing carries the controls instead; control labels
            // are index-prefixed and truncated to the label limit.
            let listing = deliverable
                .iter()
                .map(|c| format!("{}. {}", c.index + 1, c.text))
                .collect::<Vec<_>>()
                .join("\n");
            let mut texts = split_long_line(&listing, limits.plain_limit);
            let last = texts.pop().unwrap_or_default();
            for text in texts {
                messages.push(ChatMessage::plain(text));
            }

            let controls = deliverable
                .iter()
                .map(|c| ChoiceControl {
                    index: c.index,
                    label: truncate_label(
                        &format!("{}. {}", c.index + 1, c.text),
                        limits.control_label_limit,
                    ),
                    style: c.style_tag.clone(),
                })
                .collect();
            messages.push(ChatMessage::Plain(PlainMessage {
                text: last,
                controls: rows(controls),
            }));
        }
    }

    if dropped > 0 {
        messages.push(ChatMessage::plain(format!(
            "{} more choice(s) could not be shown; at most {} are supported.",
            dropped, capacity
        )));
    }
}

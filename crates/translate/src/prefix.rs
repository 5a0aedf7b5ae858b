//! Speaker-name prefixing shared by every converter.
//!
//! Providers without a per-turn `name` field get the speaker folded into the
//! text as `"Name: ..."`. Prefixing never doubles an existing prefix.

use promptrelay_types::{Content, ContentPart, Message, PromptNames, Role};

/// Reserved name marking a few-shot user turn embedded as a system message.
pub const EXAMPLE_USER: &str = "example_user";
/// Reserved name marking a few-shot assistant turn embedded as a system message.
pub const EXAMPLE_ASSISTANT: &str = "example_assistant";

/// Prepends `"{speaker}: "` to `text` unless it is already there.
#[must_use]
pub fn prefix_once(speaker: &str, text: &str) -> String {
    if has_prefix(speaker, text) {
        text.to_string()
    } else {
        format!("{speaker}: {text}")
    }
}

/// `true` if `text` opens with `"{speaker}: "`.
#[must_use]
pub fn has_prefix(speaker: &str, text: &str) -> bool {
    text.strip_prefix(speaker)
        .is_some_and(|rest| rest.starts_with(": "))
}

struct Speaker {
    name: String,
    // example_assistant turns already attributed to a group member stay as-is
    skip_group_prefixed: bool,
}

fn speaker(msg: &Message, names: &PromptNames) -> Option<Speaker> {
    let name = msg.name()?;
    if msg.role != Role::System {
        return Some(Speaker {
            name: name.to_string(),
            skip_group_prefixed: false,
        });
    }
    match name {
        EXAMPLE_USER if !names.user_name.is_empty() => Some(Speaker {
            name: names.user_name.clone(),
            skip_group_prefixed: false,
        }),
        EXAMPLE_ASSISTANT if !names.char_name.is_empty() => Some(Speaker {
            name: names.char_name.clone(),
            skip_group_prefixed: true,
        }),
        _ => None,
    }
}

/// Which text pieces of a structured message receive the speaker prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixScope {
    /// Every non-empty text part.
    EveryText,
    /// Only the opening text of the message.
    LeadingText,
}

/// Folds the message's speaker into its text and clears `name`.
///
/// System turns are only prefixed when they carry one of the reserved
/// example names; any other named turn is prefixed with its own name.
pub fn apply_speaker_prefix(msg: &mut Message, names: &PromptNames) {
    apply_speaker_prefix_in(msg, names, PrefixScope::EveryText);
}

/// [`apply_speaker_prefix`] with an explicit [`PrefixScope`].
pub fn apply_speaker_prefix_in(msg: &mut Message, names: &PromptNames, scope: PrefixScope) {
    if let Some(speaker) = speaker(msg, names) {
        let skip = |text: &str| speaker.skip_group_prefixed && names.starts_with_group_name(text);
        match scope {
            PrefixScope::LeadingText => prefix_leading_text(&mut msg.content, &speaker.name, skip),
            PrefixScope::EveryText => match &mut msg.content {
                Content::Text(text) => prefix_in_place(text, &speaker.name, skip),
                Content::Parts(parts) => {
                    for part in parts {
                        if let ContentPart::Text { text } = part {
                            prefix_in_place(text, &speaker.name, skip);
                        }
                    }
                }
            },
        }
    }
    msg.name = None;
}

fn prefix_in_place(text: &mut String, speaker: &str, skip: impl Fn(&str) -> bool) {
    if !text.is_empty() && !skip(text) {
        *text = prefix_once(speaker, text);
    }
}

/// Prefixes only the opening text of `content`.
///
/// When structured content opens with a non-text part, a bare `"{speaker}:"`
/// text part is inserted in front of it.
pub fn prefix_leading_text(content: &mut Content, speaker: &str, skip: impl Fn(&str) -> bool) {
    match content {
        Content::Text(text) => prefix_in_place(text, speaker, skip),
        Content::Parts(parts) => match parts.first_mut() {
            Some(ContentPart::Text { text }) => prefix_in_place(text, speaker, skip),
            Some(_) => parts.insert(0, ContentPart::text(format!("{speaker}:"))),
            None => {}
        },
    }
}

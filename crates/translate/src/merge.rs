//! Generic prompt post-processing for OpenAI-compatible backends.
//!
//! Consecutive same-role turns are squashed, speaker names are folded into
//! the text, and the strict variants additionally pin down the shape of the
//! conversation head: a single optional system turn followed by a user turn.

use std::str::FromStr;

use crate::prefix::{PrefixScope, apply_speaker_prefix_in, prefix_leading_text};
use promptrelay_types::{Content, ContentPart, Message, PromptNames, RelayError, Result, Role};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// Only the first turn may be `system`; the head is normalized.
    pub strict: bool,
    /// Insert placeholder user turns where strict mode needs one.
    pub placeholders: bool,
    /// Collapse the whole conversation into user turns.
    pub single: bool,
    /// Keep `tool` turns and `tool_calls`.
    pub tools: bool,
}

/// Named post-processing presets accepted in requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PostProcessing {
    #[default]
    None,
    Merge,
    MergeTools,
    Semi,
    SemiTools,
    Strict,
    StrictTools,
    Single,
}

impl PostProcessing {
    /// The merge settings for this preset, `None` when messages pass through.
    #[must_use]
    pub fn merge_options(self) -> Option<MergeOptions> {
        let opts = |strict, placeholders, tools| MergeOptions {
            strict,
            placeholders,
            single: false,
            tools,
        };
        match self {
            Self::None => None,
            Self::Merge => Some(opts(false, false, false)),
            Self::MergeTools => Some(opts(false, false, true)),
            Self::Semi => Some(opts(true, false, false)),
            Self::SemiTools => Some(opts(true, false, true)),
            Self::Strict => Some(opts(true, true, false)),
            Self::StrictTools => Some(opts(true, true, true)),
            Self::Single => Some(MergeOptions {
                strict: true,
                single: true,
                ..MergeOptions::default()
            }),
        }
    }

    /// Applies the preset to `messages`.
    #[must_use]
    pub fn apply(self, messages: Vec<Message>, names: &PromptNames, placeholder: &str) -> Vec<Message> {
        match self.merge_options() {
            Some(options) => merge_messages(messages, names, placeholder, options),
            None => messages,
        }
    }
}

impl FromStr for PostProcessing {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" | "none" => Ok(Self::None),
            "merge" => Ok(Self::Merge),
            "merge_tools" => Ok(Self::MergeTools),
            "semi" => Ok(Self::Semi),
            "semi_tools" => Ok(Self::SemiTools),
            "strict" => Ok(Self::Strict),
            "strict_tools" => Ok(Self::StrictTools),
            "single" => Ok(Self::Single),
            other => Err(RelayError::Conversion(format!(
                "unknown prompt post-processing: {other}"
            ))),
        }
    }
}

/// Squashes and prefixes `messages` according to `options`.
///
/// In strict mode the normalization runs twice around the head-shaping step,
/// so the result is stable under another pass.
#[must_use]
pub fn merge_messages(
    messages: Vec<Message>,
    names: &PromptNames,
    placeholder: &str,
    options: MergeOptions,
) -> Vec<Message> {
    let merged = normalize(messages, names, placeholder, options);
    if !options.strict {
        return merged;
    }
    let shaped = enforce_leading_shape(merged, options.placeholders, placeholder);
    normalize(
        shaped,
        names,
        placeholder,
        MergeOptions {
            strict: false,
            single: false,
            ..options
        },
    )
}

fn normalize(
    messages: Vec<Message>,
    names: &PromptNames,
    placeholder: &str,
    options: MergeOptions,
) -> Vec<Message> {
    let mut merged: Vec<Message> = Vec::with_capacity(messages.len());

    for mut msg in messages {
        msg.content = flatten(std::mem::take(&mut msg.content));
        apply_speaker_prefix_in(&mut msg, names, PrefixScope::LeadingText);

        if !options.tools {
            if msg.role == Role::Tool {
                msg.role = Role::User;
            }
            msg.tool_calls.clear();
            msg.tool_call_id = None;
        }

        if options.single {
            match msg.role {
                Role::Assistant if !names.char_name.is_empty() => {
                    prefix_leading_text(&mut msg.content, &names.char_name, |text| {
                        names.starts_with_group_name(text)
                    });
                }
                Role::User if !names.user_name.is_empty() => {
                    prefix_leading_text(&mut msg.content, &names.user_name, |_| false);
                }
                _ => {}
            }
            msg.role = Role::User;
        }

        match merged.last_mut() {
            Some(last) if last.role == msg.role && msg.role != Role::Tool => {
                last.content.append(msg.content, "\n\n");
                last.tool_calls.append(&mut msg.tool_calls);
            }
            _ => merged.push(msg),
        }
    }

    if merged.is_empty() {
        merged.push(Message::user(placeholder));
    }
    merged
}

/// Reduces content to text plus media, joining adjacent texts.
///
/// Content without media collapses to a plain string.
fn flatten(content: Content) -> Content {
    let Content::Parts(parts) = content else {
        return content;
    };
    let mut flat = Content::default();
    for part in parts {
        let piece = match part {
            ContentPart::Text { text } => Content::Text(text),
            media if media.media().is_some() => Content::Parts(vec![media]),
            _ => continue,
        };
        flat.append(piece, "\n\n");
    }
    flat
}

fn enforce_leading_shape(mut messages: Vec<Message>, placeholders: bool, placeholder: &str) -> Vec<Message> {
    for msg in messages.iter_mut().skip(1) {
        if msg.role == Role::System {
            msg.role = Role::User;
        }
    }
    if placeholders && let Some(first) = messages.first().map(|m| m.role) {
        if first == Role::System {
            if messages.get(1).is_none_or(|m| m.role != Role::User) {
                messages.insert(1, Message::user(placeholder));
            }
        } else if first != Role::User {
            messages.insert(0, Message::user(placeholder));
        }
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptrelay_types::{DEFAULT_PLACEHOLDER, MediaUrl, ToolCall};
    use rand::{Rng as _, SeedableRng as _, rngs::StdRng};

    fn names() -> PromptNames {
        PromptNames {
            char_name: "Alice".into(),
            user_name: "Bob".into(),
            group_names: Vec::new(),
        }
    }

    fn image() -> ContentPart {
        ContentPart::ImageUrl {
            image_url: MediaUrl::new("data:image/png;base64,AAAA"),
        }
    }

    fn random_messages(rng: &mut StdRng) -> Vec<Message> {
        let roles = [Role::System, Role::User, Role::Assistant, Role::Tool];
        let len = rng.gen_range(1..=20);
        (0..len)
            .map(|i| Message::new(roles[rng.gen_range(0..roles.len())], format!("m{i}")))
            .collect()
    }

    #[test]
    fn test_preset_parsing() {
        assert_eq!("".parse::<PostProcessing>().unwrap(), PostProcessing::None);
        assert_eq!(
            "strict_tools".parse::<PostProcessing>().unwrap(),
            PostProcessing::StrictTools
        );
        assert!("bogus".parse::<PostProcessing>().is_err());
        assert!(PostProcessing::None.merge_options().is_none());
        assert!(PostProcessing::Single.merge_options().unwrap().single);
    }

    #[test]
    fn test_merge_squashes_same_role() {
        let out = merge_messages(
            vec![Message::user("a"), Message::user("b"), Message::assistant("c")],
            &PromptNames::default(),
            DEFAULT_PLACEHOLDER,
            MergeOptions::default(),
        );
        assert_eq!(out, vec![Message::user("a\n\nb"), Message::assistant("c")]);
    }

    #[test]
    fn test_empty_input_yields_placeholder() {
        let out = merge_messages(
            Vec::new(),
            &PromptNames::default(),
            DEFAULT_PLACEHOLDER,
            MergeOptions::default(),
        );
        assert_eq!(out, vec![Message::user(DEFAULT_PLACEHOLDER)]);
    }

    #[test]
    fn test_tools_dropped_without_tool_support() {
        let mut call = Message::assistant("checking");
        call.tool_calls = vec![ToolCall::new("c1", "f", "{}")];
        let mut result = Message::new(Role::Tool, "done");
        result.tool_call_id = Some("c1".into());

        let out = merge_messages(
            vec![Message::user("go"), call, result],
            &PromptNames::default(),
            DEFAULT_PLACEHOLDER,
            MergeOptions::default(),
        );
        assert_eq!(out[2], Message::user("done"));
        assert!(out[1].tool_calls.is_empty());
    }

    #[test]
    fn test_tool_turns_never_merged_with_tools() {
        let tool = |id: &str| {
            let mut m = Message::new(Role::Tool, "r");
            m.tool_call_id = Some(id.into());
            m
        };
        let out = merge_messages(
            vec![tool("a"), tool("b")],
            &PromptNames::default(),
            DEFAULT_PLACEHOLDER,
            MergeOptions {
                tools: true,
                ..MergeOptions::default()
            },
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].tool_call_id.as_deref(), Some("b"));
    }

    #[test]
    fn test_merged_tool_calls_kept() {
        let mut call = Message::assistant("");
        call.tool_calls = vec![ToolCall::new("c1", "f", "{}")];
        let out = merge_messages(
            vec![Message::user("go"), Message::assistant("let me see"), call],
            &PromptNames::default(),
            DEFAULT_PLACEHOLDER,
            MergeOptions {
                tools: true,
                ..MergeOptions::default()
            },
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].content, Content::from("let me see"));
        assert_eq!(out[1].tool_calls.len(), 1);
    }

    #[test]
    fn test_media_survives_merge() {
        let out = merge_messages(
            vec![
                Message::user(vec![ContentPart::text("look"), image()]),
                Message::user("and this"),
            ],
            &PromptNames::default(),
            DEFAULT_PLACEHOLDER,
            MergeOptions::default(),
        );
        assert_eq!(out.len(), 1);
        let Content::Parts(parts) = &out[0].content else {
            panic!("expected parts");
        };
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].as_text(), Some("look"));
        assert!(parts[1].media().is_some());
        assert_eq!(parts[2].as_text(), Some("and this"));
    }

    #[test]
    fn test_text_parts_collapse_to_string() {
        let out = merge_messages(
            vec![Message::user(vec![ContentPart::text("a"), ContentPart::text("b")])],
            &PromptNames::default(),
            DEFAULT_PLACEHOLDER,
            MergeOptions::default(),
        );
        assert_eq!(out, vec![Message::user("a\n\nb")]);
    }

    #[test]
    fn test_strict_moves_later_systems_to_user() {
        let out = merge_messages(
            vec![
                Message::system("rules"),
                Message::user("hi"),
                Message::system("note"),
            ],
            &PromptNames::default(),
            DEFAULT_PLACEHOLDER,
            PostProcessing::Semi.merge_options().unwrap(),
        );
        assert_eq!(out, vec![Message::system("rules"), Message::user("hi\n\nnote")]);
    }

    #[test]
    fn test_strict_placeholder_after_system() {
        let out = merge_messages(
            vec![Message::system("rules"), Message::assistant("hello")],
            &PromptNames::default(),
            "Go",
            PostProcessing::Strict.merge_options().unwrap(),
        );
        assert_eq!(
            out,
            vec![
                Message::system("rules"),
                Message::user("Go"),
                Message::assistant("hello")
            ]
        );
    }

    #[test]
    fn test_strict_placeholder_before_assistant() {
        let out = merge_messages(
            vec![Message::assistant("hello")],
            &PromptNames::default(),
            "Go",
            PostProcessing::Strict.merge_options().unwrap(),
        );
        assert_eq!(out, vec![Message::user("Go"), Message::assistant("hello")]);
    }

    #[test]
    fn test_single_collapses_to_user() {
        let out = merge_messages(
            vec![
                Message::system("rules"),
                Message::user("hi"),
                Message::assistant("hello"),
            ],
            &names(),
            DEFAULT_PLACEHOLDER,
            PostProcessing::Single.merge_options().unwrap(),
        );
        assert_eq!(
            out,
            vec![Message::user("rules\n\nBob: hi\n\nAlice: hello")]
        );
    }

    #[test]
    fn test_strict_is_fixed_point() {
        let mut rng = StdRng::seed_from_u64(11);
        for preset in [
            PostProcessing::Semi,
            PostProcessing::Strict,
            PostProcessing::StrictTools,
        ] {
            let options = preset.merge_options().unwrap();
            for _ in 0..100 {
                let once = merge_messages(random_messages(&mut rng), &names(), "Go", options);
                let twice = merge_messages(once.clone(), &names(), "Go", options);
                assert_eq!(once, twice, "{preset:?}");
            }
        }
    }

    #[test]
    fn test_roles_alternate_without_tools() {
        let mut rng = StdRng::seed_from_u64(5);
        for preset in [PostProcessing::Merge, PostProcessing::Semi, PostProcessing::Strict] {
            let options = preset.merge_options().unwrap();
            for _ in 0..200 {
                let out = merge_messages(
                    random_messages(&mut rng),
                    &PromptNames::default(),
                    DEFAULT_PLACEHOLDER,
                    options,
                );
                assert!(!out.is_empty());
                for pair in out.windows(2) {
                    assert_ne!(pair[0].role, pair[1].role, "{preset:?}");
                }
                if options.strict {
                    assert!(out.iter().skip(1).all(|m| m.role != Role::System));
                }
            }
        }
    }
}

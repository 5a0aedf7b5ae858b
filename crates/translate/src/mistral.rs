//! Converts generic messages into the Mistral chat shape.

use crate::prefix::apply_speaker_prefix;
use promptrelay_types::{Message, PromptNames, Role};
use sha2::{Digest as _, Sha512};

/// Mistral only accepts 9-character `[a-zA-Z0-9]` tool call ids.
const TOOL_ID_LEN: usize = 9;

#[derive(Debug, Clone, Copy, Default)]
pub struct MistralOptions {
    /// Mark a trailing assistant turn as a continuation prefix.
    pub enable_prefix: bool,
}

/// Maps an arbitrary tool call id onto Mistral's id format.
#[must_use]
pub fn sanitize_tool_id(id: &str) -> String {
    let digest = hex::encode(Sha512::digest(id.as_bytes()));
    digest[..TOOL_ID_LEN].to_string()
}

/// Converts `messages` into Mistral chat messages.
#[must_use]
pub fn convert_mistral(
    mut messages: Vec<Message>,
    options: MistralOptions,
    names: &PromptNames,
    placeholder: &str,
) -> Vec<Message> {
    if messages.is_empty() {
        messages.push(Message::user(placeholder));
    }

    if options.enable_prefix
        && let Some(last) = messages.last_mut()
        && last.role == Role::Assistant
    {
        last.prefix = true;
    }

    for msg in &mut messages {
        for call in &mut msg.tool_calls {
            call.id = sanitize_tool_id(&call.id);
        }
        if msg.role == Role::Tool
            && let Some(id) = msg.tool_call_id.as_mut()
        {
            *id = sanitize_tool_id(id);
        }
        apply_speaker_prefix(msg, names);
    }

    fold_user_after_tool(&mut messages);

    for i in 1..messages.len() {
        if messages[i - 1].role == Role::Assistant && messages[i].role == Role::System {
            messages[i].role = Role::User;
        }
    }
    messages
}

/// Mistral rejects a user turn directly after a tool result. Such turns are
/// appended to the nearest earlier user turn that has content, repeating
/// until no more folds apply.
fn fold_user_after_tool(messages: &mut Vec<Message>) {
    loop {
        let fold = (0..messages.len().saturating_sub(1)).find_map(|i| {
            if messages[i].role != Role::Tool || messages[i + 1].role != Role::User {
                return None;
            }
            messages[..i]
                .iter()
                .rposition(|m| m.role == Role::User && !m.content.is_empty())
                .map(|target| (target, i + 1))
        });
        let Some((target, source)) = fold else {
            break;
        };
        let moved = messages.remove(source);
        messages[target].content.append(moved.content, "\n\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptrelay_types::{Content, DEFAULT_PLACEHOLDER, ToolCall};

    fn tool(id: &str, content: &str) -> Message {
        let mut m = Message::new(Role::Tool, content);
        m.tool_call_id = Some(id.into());
        m
    }

    #[test]
    fn test_sanitize_tool_id_shape() {
        let id = sanitize_tool_id("call_abc123");
        assert_eq!(id.len(), 9);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id, sanitize_tool_id("call_abc123"));
        assert_ne!(id, sanitize_tool_id("call_abc124"));
    }

    #[test]
    fn test_tool_ids_sanitized_consistently() {
        let mut call = Message::assistant("");
        call.tool_calls = vec![ToolCall::new("call_1", "f", "{}")];
        let out = convert_mistral(
            vec![Message::user("go"), call, tool("call_1", "ok")],
            MistralOptions::default(),
            &PromptNames::default(),
            DEFAULT_PLACEHOLDER,
        );
        let expected = sanitize_tool_id("call_1");
        assert_eq!(out[1].tool_calls[0].id, expected);
        assert_eq!(out[2].tool_call_id.as_deref(), Some(expected.as_str()));
    }

    #[test]
    fn test_prefix_flag_only_when_enabled() {
        let input = || vec![Message::user("hi"), Message::assistant("Sure")];
        let out = convert_mistral(
            input(),
            MistralOptions { enable_prefix: true },
            &PromptNames::default(),
            DEFAULT_PLACEHOLDER,
        );
        assert!(out[1].prefix);
        assert_eq!(serde_json::to_value(&out[1]).unwrap()["prefix"], true);

        let out = convert_mistral(
            input(),
            MistralOptions::default(),
            &PromptNames::default(),
            DEFAULT_PLACEHOLDER,
        );
        assert!(!out[1].prefix);
        assert!(serde_json::to_value(&out[1]).unwrap().get("prefix").is_none());
    }

    #[test]
    fn test_user_after_tool_folded_into_previous_user() {
        let mut call = Message::assistant("");
        call.tool_calls = vec![ToolCall::new("c", "f", "{}")];
        let out = convert_mistral(
            vec![
                Message::user("first"),
                call,
                tool("c", "result"),
                Message::user("second"),
                Message::user("third"),
            ],
            MistralOptions::default(),
            &PromptNames::default(),
            DEFAULT_PLACEHOLDER,
        );
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].content, Content::from("first\n\nsecond\n\nthird"));
        assert_eq!(out[2].role, Role::Tool);
    }

    #[test]
    fn test_no_prior_user_leaves_order_alone() {
        let out = convert_mistral(
            vec![tool("c", "result"), Message::user("after")],
            MistralOptions::default(),
            &PromptNames::default(),
            DEFAULT_PLACEHOLDER,
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].role, Role::User);
    }

    #[test]
    fn test_system_after_assistant_becomes_user() {
        let out = convert_mistral(
            vec![
                Message::system("rules"),
                Message::user("hi"),
                Message::assistant("hello"),
                Message::system("note"),
            ],
            MistralOptions::default(),
            &PromptNames::default(),
            DEFAULT_PLACEHOLDER,
        );
        assert_eq!(out[0].role, Role::System);
        assert_eq!(out[3].role, Role::User);
    }

    #[test]
    fn test_names_prefixed_once() {
        let out = convert_mistral(
            vec![Message::user("Dave: hi").with_name("Dave")],
            MistralOptions::default(),
            &PromptNames::default(),
            DEFAULT_PLACEHOLDER,
        );
        assert_eq!(out[0].content, Content::from("Dave: hi"));
        assert!(out[0].name.is_none());
    }

    #[test]
    fn test_empty_input_yields_placeholder() {
        let out = convert_mistral(
            Vec::new(),
            MistralOptions::default(),
            &PromptNames::default(),
            DEFAULT_PLACEHOLDER,
        );
        assert_eq!(out, vec![Message::user(DEFAULT_PLACEHOLDER)]);
    }
}

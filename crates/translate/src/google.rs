//! Converts generic messages into the Google AI Studio (`MakerSuite`) shape.

use crate::prefix::apply_speaker_prefix;
use promptrelay_types::{Content, ContentPart, Message, PromptNames, Role};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;

/// Model name prefixes that accept inline image, video and audio data.
const VISION_MODEL_PREFIXES: &[&str] = &[
    "gemini-1.5-",
    "gemini-2.0-",
    "gemini-2.5-",
    "gemini-3",
    "gemini-exp-",
    "gemini-pro-vision",
    "gemma-3",
    "learnlm-",
];

/// Returns `true` if `model` may receive inline media.
#[must_use]
pub fn is_vision_model(model: &str) -> bool {
    VISION_MODEL_PREFIXES.iter().any(|p| model.starts_with(p))
}

#[derive(Debug, Clone, Default)]
pub struct GoogleOptions {
    pub model: String,
    pub use_system_prompt: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoogleRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallPart {
    pub name: String,
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponsePart {
    pub name: String,
    pub response: Value,
}

/// A Gemini `Part`, serialized externally tagged (`{"text": ...}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GooglePart {
    Text(String),
    InlineData(InlineData),
    FunctionCall(FunctionCallPart),
    FunctionResponse(FunctionResponsePart),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoogleContent {
    pub role: GoogleRole,
    pub parts: Vec<GooglePart>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInstruction {
    pub parts: Vec<GooglePart>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GooglePrompt {
    pub contents: Vec<GoogleContent>,
    pub system_instruction: Option<SystemInstruction>,
}

/// Converts `messages` into `contents` plus an optional `system_instruction`.
#[must_use]
pub fn convert_google(
    messages: Vec<Message>,
    options: &GoogleOptions,
    names: &PromptNames,
    placeholder: &str,
) -> GooglePrompt {
    let mut messages = std::collections::VecDeque::from(messages);
    let mut system_texts = Vec::new();

    if options.use_system_prompt {
        while messages.len() > 1 && messages.front().is_some_and(|m| m.role == Role::System) {
            if let Some(mut msg) = messages.pop_front() {
                apply_speaker_prefix(&mut msg, names);
                system_texts.push(msg.content.into_text());
            }
        }
    }
    let system_prompt = system_texts.join("\n\n").trim().to_string();
    let system_instruction = (!system_prompt.is_empty()).then(|| SystemInstruction {
        parts: vec![GooglePart::Text(system_prompt)],
    });

    let tool_names: HashMap<String, String> = messages
        .iter()
        .flat_map(|m| &m.tool_calls)
        .map(|c| (c.id.clone(), c.function.name.clone()))
        .collect();
    let vision = is_vision_model(&options.model);

    let mut contents: Vec<GoogleContent> = Vec::new();
    for msg in messages {
        let content = convert_message(msg, names, &tool_names, vision);
        match contents.last_mut() {
            Some(last) if last.role == content.role => merge_parts(&mut last.parts, content.parts),
            _ => contents.push(content),
        }
    }

    if contents.is_empty() {
        contents.push(GoogleContent {
            role: GoogleRole::User,
            parts: vec![GooglePart::Text(placeholder.to_string())],
        });
    }

    GooglePrompt {
        contents,
        system_instruction,
    }
}

fn convert_message(
    mut msg: Message,
    names: &PromptNames,
    tool_names: &HashMap<String, String>,
    vision: bool,
) -> GoogleContent {
    let role = match msg.role {
        Role::Assistant => GoogleRole::Model,
        Role::System | Role::User | Role::Tool => GoogleRole::User,
    };

    if msg.role == Role::Tool {
        let name = msg
            .tool_call_id
            .as_ref()
            .and_then(|id| tool_names.get(id))
            .cloned()
            .unwrap_or_else(|| "unknown".to_string());
        let content = msg.content.into_text();
        return GoogleContent {
            role,
            parts: vec![GooglePart::FunctionResponse(FunctionResponsePart {
                response: json!({"name": name, "content": content}),
                name,
            })],
        };
    }

    apply_speaker_prefix(&mut msg, names);
    let mut parts: Vec<GooglePart> = match msg.content {
        Content::Text(text) if text.is_empty() => Vec::new(),
        Content::Text(text) => vec![GooglePart::Text(text)],
        Content::Parts(parts) => parts
            .into_iter()
            .filter_map(|p| convert_part(p, vision))
            .collect(),
    };

    for call in &msg.tool_calls {
        parts.push(GooglePart::FunctionCall(FunctionCallPart {
            name: call.function.name.clone(),
            args: call.parsed_arguments(),
        }));
    }
    if parts.is_empty() {
        parts.push(GooglePart::Text(String::new()));
    }

    GoogleContent { role, parts }
}

fn convert_part(part: ContentPart, vision: bool) -> Option<GooglePart> {
    if let Some(media) = part.media() {
        if !vision {
            return None;
        }
        let uri = media.data_uri()?;
        return Some(GooglePart::InlineData(InlineData {
            mime_type: uri.mime_type.to_string(),
            data: uri.data.to_string(),
        }));
    }
    match part {
        ContentPart::Text { text } => Some(GooglePart::Text(text)),
        _ => None,
    }
}

/// Folds a same-role turn into the previous one. Incoming text joins the
/// first text part of the previous turn; everything else is appended.
fn merge_parts(target: &mut Vec<GooglePart>, incoming: Vec<GooglePart>) {
    for part in incoming {
        let text = match part {
            GooglePart::Text(text) => text,
            other => {
                target.push(other);
                continue;
            }
        };
        let first_text = target.iter_mut().find_map(|p| match p {
            GooglePart::Text(existing) => Some(existing),
            _ => None,
        });
        match first_text {
            Some(existing) if existing.is_empty() => *existing = text,
            Some(existing) => {
                if !text.is_empty() {
                    existing.push_str("\n\n");
                    existing.push_str(&text);
                }
            }
            None => target.push(GooglePart::Text(text)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefix::EXAMPLE_ASSISTANT;
    use promptrelay_types::{DEFAULT_PLACEHOLDER, MediaUrl, ToolCall};
    use rand::{Rng as _, SeedableRng as _, rngs::StdRng};

    fn opts(model: &str) -> GoogleOptions {
        GoogleOptions {
            model: model.into(),
            use_system_prompt: true,
        }
    }

    #[test]
    fn test_empty_input_yields_placeholder() {
        let out = convert_google(Vec::new(), &opts("gemini-2.0-flash"), &PromptNames::default(), DEFAULT_PLACEHOLDER);
        assert_eq!(
            out.contents,
            vec![GoogleContent {
                role: GoogleRole::User,
                parts: vec![GooglePart::Text(DEFAULT_PLACEHOLDER.into())],
            }]
        );
        assert!(out.system_instruction.is_none());
    }

    #[test]
    fn test_system_instruction_joined_and_trimmed() {
        let names = PromptNames {
            char_name: "Alice".into(),
            ..PromptNames::default()
        };
        let out = convert_google(
            vec![
                Message::system("  Rules"),
                Message::system("hi").with_name(EXAMPLE_ASSISTANT),
                Message::user("Hello"),
            ],
            &opts("gemini-2.0-flash"),
            &names,
            DEFAULT_PLACEHOLDER,
        );
        assert_eq!(
            out.system_instruction,
            Some(SystemInstruction {
                parts: vec![GooglePart::Text("Rules\n\nAlice: hi".into())]
            })
        );
        assert_eq!(out.contents.len(), 1);
    }

    #[test]
    fn test_last_system_message_kept_as_content() {
        let out = convert_google(
            vec![Message::system("only")],
            &opts("gemini-2.0-flash"),
            &PromptNames::default(),
            DEFAULT_PLACEHOLDER,
        );
        assert!(out.system_instruction.is_none());
        assert_eq!(out.contents[0].role, GoogleRole::User);
        assert_eq!(out.contents[0].parts, vec![GooglePart::Text("only".into())]);
    }

    #[test]
    fn test_roles_remapped_and_merged() {
        let out = convert_google(
            vec![
                Message::user("a"),
                Message::user("b"),
                Message::assistant("c"),
            ],
            &opts("gemini-2.0-flash"),
            &PromptNames::default(),
            DEFAULT_PLACEHOLDER,
        );
        assert_eq!(out.contents.len(), 2);
        assert_eq!(out.contents[0].parts, vec![GooglePart::Text("a\n\nb".into())]);
        assert_eq!(out.contents[1].role, GoogleRole::Model);
    }

    #[test]
    fn test_merged_text_joins_first_text_part() {
        let out = convert_google(
            vec![
                Message::user(vec![
                    ContentPart::text("a"),
                    ContentPart::ImageUrl {
                        image_url: MediaUrl::new("data:image/png;base64,AAAA"),
                    },
                ]),
                Message::user("b"),
            ],
            &opts("gemini-2.0-flash"),
            &PromptNames::default(),
            DEFAULT_PLACEHOLDER,
        );
        assert_eq!(out.contents.len(), 1);
        let parts = &out.contents[0].parts;
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], GooglePart::Text("a\n\nb".into()));
        assert!(matches!(parts[1], GooglePart::InlineData(_)));
    }

    #[test]
    fn test_images_only_for_vision_models() {
        let msg = || {
            vec![Message::user(vec![
                ContentPart::text("see"),
                ContentPart::ImageUrl {
                    image_url: MediaUrl::new("data:image/png;base64,AAAA"),
                },
            ])]
        };
        let out = convert_google(msg(), &opts("gemini-2.0-flash"), &PromptNames::default(), DEFAULT_PLACEHOLDER);
        assert_eq!(
            out.contents[0].parts[1],
            GooglePart::InlineData(InlineData {
                mime_type: "image/png".into(),
                data: "AAAA".into()
            })
        );

        let out = convert_google(msg(), &opts("gemini-1.0-pro"), &PromptNames::default(), DEFAULT_PLACEHOLDER);
        assert_eq!(out.contents[0].parts, vec![GooglePart::Text("see".into())]);
    }

    #[test]
    fn test_function_call_and_response() {
        let mut call = Message::assistant("");
        call.tool_calls = vec![ToolCall::new("c1", "lookup", r#"{"q":"x"}"#)];
        let mut result = Message::new(Role::Tool, "found");
        result.tool_call_id = Some("c1".into());

        let out = convert_google(
            vec![Message::user("find x"), call, result],
            &opts("gemini-2.0-flash"),
            &PromptNames::default(),
            DEFAULT_PLACEHOLDER,
        );
        assert_eq!(out.contents.len(), 3);
        assert_eq!(
            out.contents[1].parts,
            vec![GooglePart::FunctionCall(FunctionCallPart {
                name: "lookup".into(),
                args: json!({"q": "x"})
            })]
        );
        let response = serde_json::to_value(&out.contents[2].parts[0]).unwrap();
        assert_eq!(
            response,
            json!({"functionResponse": {"name": "lookup", "response": {"name": "lookup", "content": "found"}}})
        );
    }

    #[test]
    fn test_serialized_part_shapes() {
        let v = serde_json::to_value(GooglePart::InlineData(InlineData {
            mime_type: "image/png".into(),
            data: "AA".into(),
        }))
        .unwrap();
        assert_eq!(v, json!({"inlineData": {"mimeType": "image/png", "data": "AA"}}));
        let v = serde_json::to_value(GooglePart::Text("hi".into())).unwrap();
        assert_eq!(v, json!({"text": "hi"}));
    }

    #[test]
    fn test_name_prefix_idempotent() {
        let out = convert_google(
            vec![Message::user("Dave: hi").with_name("Dave")],
            &opts("gemini-2.0-flash"),
            &PromptNames::default(),
            DEFAULT_PLACEHOLDER,
        );
        assert_eq!(out.contents[0].parts, vec![GooglePart::Text("Dave: hi".into())]);
    }

    #[test]
    fn test_roles_alternate_for_random_sequences() {
        let roles = [Role::System, Role::User, Role::Assistant, Role::Tool];
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let len = rng.gen_range(1..=20);
            let messages: Vec<Message> = (0..len)
                .map(|i| Message::new(roles[rng.gen_range(0..roles.len())], format!("m{i}")))
                .collect();
            let out = convert_google(messages, &opts("gemini-2.0-flash"), &PromptNames::default(), DEFAULT_PLACEHOLDER);
            assert!(!out.contents.is_empty());
            for pair in out.contents.windows(2) {
                assert_ne!(pair[0].role, pair[1].role);
            }
        }
    }
}

//! Flattens structured turns into a single text-completion prompt.

use promptrelay_types::{Message, PromptInput, Role};

/// Renders `messages` as `"speaker: content"` lines followed by a
/// `"\nassistant:"` cue. The cue keeps its newline even for an empty list.
///
/// Unnamed system turns are spoken by `System`, named ones by their name,
/// and every other turn by its role. Same-role turns are not merged.
#[must_use]
pub fn flatten_prompt(messages: Vec<Message>) -> String {
    let body = messages
        .into_iter()
        .map(|msg| {
            let speaker = match (msg.role, msg.name()) {
                (Role::System, Some(name)) => name.to_string(),
                (Role::System, None) => "System".to_string(),
                (role, _) => role.as_str().to_string(),
            };
            format!("{speaker}: {}", msg.content.into_text())
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("{body}\nassistant:")
}

/// Returns the prompt text, flattening message lists.
#[must_use]
pub fn prompt_text(prompt: PromptInput) -> String {
    match prompt {
        PromptInput::Text(text) => text,
        PromptInput::Messages(messages) => flatten_prompt(messages),
    }
}

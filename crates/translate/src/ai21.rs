//! Converts generic messages into the AI21 chat shape.

use crate::prefix::apply_speaker_prefix;
use promptrelay_types::{Content, Message, PromptNames, Role};

/// Squashes leading system turns into one system message and merges
/// consecutive same-role turns as plain text.
///
/// Merged texts are always separated by a blank line, even when one side is
/// empty.
#[must_use]
pub fn convert_ai21(messages: Vec<Message>, names: &PromptNames, placeholder: &str) -> Vec<Message> {
    let mut rest = messages.into_iter().peekable();

    let mut system_texts = Vec::new();
    while let Some(mut msg) = rest.next_if(|m| m.role == Role::System) {
        apply_speaker_prefix(&mut msg, names);
        system_texts.push(msg.content.into_text());
    }
    let system_prompt = system_texts.join("\n\n").trim().to_string();

    let mut turns: Vec<Message> = rest.collect();
    if turns.is_empty() {
        turns.push(Message::user(placeholder));
    }
    if !system_prompt.is_empty() {
        turns.insert(0, Message::system(system_prompt));
    }

    let mut merged: Vec<Message> = Vec::with_capacity(turns.len());
    for mut msg in turns {
        apply_speaker_prefix(&mut msg, names);
        let text = std::mem::take(&mut msg.content).into_text();
        match merged.last_mut() {
            Some(last) if last.role == msg.role => {
                let mut joined = std::mem::take(&mut last.content).into_text();
                joined.push_str("\n\n");
                joined.push_str(&text);
                last.content = Content::Text(joined);
            }
            _ => {
                msg.content = Content::Text(text);
                merged.push(msg);
            }
        }
    }
    merged
}

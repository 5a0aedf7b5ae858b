//! Converts generic messages into Cohere chat history.

use crate::prefix::apply_speaker_prefix;
use promptrelay_types::{Content, Message, PromptNames, Role};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CoherePrompt {
    pub chat_history: Vec<Message>,
}

/// Converts `messages` into Cohere chat history.
///
/// A tool-calling turn takes over the content of the assistant turn right
/// before it, which is dropped. Without one, its content becomes a one-line
/// summary of the calls. The history always ends on a
/// `user` or `tool` turn.
#[must_use]
pub fn convert_cohere(messages: Vec<Message>, names: &PromptNames, placeholder: &str) -> CoherePrompt {
    let mut history: Vec<Message> = Vec::with_capacity(messages.len().max(1));

    for mut msg in messages {
        if !msg.tool_calls.is_empty() {
            let previous = if history.last().is_some_and(|prev| prev.role == Role::Assistant) {
                history.pop()
            } else {
                None
            };
            msg.content = match previous {
                Some(prev) => prev.content,
                None => {
                    let tools: Vec<&str> = msg
                        .tool_calls
                        .iter()
                        .map(|c| c.function.name.as_str())
                        .collect();
                    Content::Text(format!(
                        "I'm going to call a tool for that: {}",
                        tools.join(", ")
                    ))
                }
            };
        }
        apply_speaker_prefix(&mut msg, names);
        history.push(msg);
    }

    if history.is_empty() {
        history.push(Message::user(placeholder));
    }
    if let Some(last) = history.last_mut()
        && !matches!(last.role, Role::User | Role::Tool)
    {
        last.role = Role::User;
    }

    CoherePrompt {
        chat_history: history,
    }
}

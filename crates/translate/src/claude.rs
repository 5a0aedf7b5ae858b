//! Converts generic messages into the Claude Messages API shape.
//!
//! Claude requires strictly alternating `user`/`assistant` turns, keeps the
//! system prompt out of band, and only accepts images on user turns.

use crate::cache_control::{CacheAnchor, CacheControl};
use crate::prefix::apply_speaker_prefix;
use promptrelay_types::{Content, ContentPart, MediaUrl, Message, PromptNames, Role};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Claude rejects empty text blocks; a zero-width space stands in for them.
const EMPTY_TEXT: &str = "\u{200b}";

/// Request-level switches for the Claude converter.
#[derive(Debug, Clone, Default)]
pub struct ClaudeOptions {
    /// Assistant continuation appended as the final turn.
    pub prefill: Option<String>,
    /// Move leading system turns into the out-of-band system prompt.
    pub use_system_prompt: bool,
    /// Keep `tool_use` / `tool_result` blocks structured.
    pub use_tools: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaudeRole {
    User,
    Assistant,
}

/// Image payload, either inline base64 or a remote URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    Base64 { media_type: String, data: String },
    Url { url: String },
}

impl ImageSource {
    fn from_media(media: &MediaUrl) -> Option<Self> {
        if let Some(uri) = media.data_uri() {
            return Some(Self::Base64 {
                media_type: uri.mime_type.to_string(),
                data: uri.data.to_string(),
            });
        }
        if media.url.starts_with("http://") || media.url.starts_with("https://") {
            return Some(Self::Url {
                url: media.url.clone(),
            });
        }
        None
    }
}

/// A Claude content block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaudeBlock {
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cache_control: Option<CacheControl>,
    },
    Image {
        source: ImageSource,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cache_control: Option<CacheControl>,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cache_control: Option<CacheControl>,
    },
    ToolResult {
        tool_use_id: String,
        content: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cache_control: Option<CacheControl>,
    },
}

impl ClaudeBlock {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::Text {
            text: if text.is_empty() {
                EMPTY_TEXT.to_string()
            } else {
                text
            },
            cache_control: None,
        }
    }

    fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }

    /// Sets the block's `cache_control` marker.
    pub fn set_cache_control(&mut self, control: CacheControl) {
        match self {
            Self::Text { cache_control, .. }
            | Self::Image { cache_control, .. }
            | Self::ToolUse { cache_control, .. }
            | Self::ToolResult { cache_control, .. } => *cache_control = Some(control),
        }
    }

    #[must_use]
    pub fn cache_control(&self) -> Option<&CacheControl> {
        match self {
            Self::Text { cache_control, .. }
            | Self::Image { cache_control, .. }
            | Self::ToolUse { cache_control, .. }
            | Self::ToolResult { cache_control, .. } => cache_control.as_ref(),
        }
    }

    fn into_plain_text(self) -> Self {
        match self {
            Self::ToolUse {
                input,
                cache_control,
                ..
            } => Self::Text {
                text: input.to_string(),
                cache_control,
            },
            Self::ToolResult {
                content,
                cache_control,
                ..
            } => Self::Text {
                text: match content {
                    Value::String(s) => s,
                    other => other.to_string(),
                },
                cache_control,
            },
            other => other,
        }
    }
}

/// One Claude turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaudeMessage {
    pub role: ClaudeRole,
    pub content: Vec<ClaudeBlock>,
}

impl CacheAnchor for ClaudeMessage {
    fn role(&self) -> &str {
        match self.role {
            ClaudeRole::User => "user",
            ClaudeRole::Assistant => "assistant",
        }
    }

    fn mark_cacheable(&mut self, control: &CacheControl) {
        if let Some(last) = self.content.last_mut() {
            last.set_cache_control(control.clone());
        }
    }
}

/// Claude-shaped prompt: turns plus the out-of-band system blocks.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClaudePrompt {
    pub messages: Vec<ClaudeMessage>,
    pub system: Vec<ClaudeBlock>,
}

impl ClaudePrompt {
    /// Marks the last system block as cacheable.
    pub fn cache_system_prompt(&mut self, control: &CacheControl) {
        if let Some(last) = self.system.last_mut() {
            last.set_cache_control(control.clone());
        }
    }
}

/// Converts `messages` into a [`ClaudePrompt`].
///
/// The input is consumed; callers keep no view of the pre-conversion turns.
#[must_use]
pub fn convert_claude(
    messages: Vec<Message>,
    options: &ClaudeOptions,
    names: &PromptNames,
    placeholder: &str,
) -> ClaudePrompt {
    let mut rest = messages.into_iter().peekable();
    let mut system = Vec::new();

    if options.use_system_prompt {
        while let Some(mut msg) = rest.next_if(|m| m.role == Role::System) {
            apply_speaker_prefix(&mut msg, names);
            let text = msg.content.into_text();
            if !text.is_empty() {
                system.push(ClaudeBlock::text(text));
            }
        }
    }

    let mut turns: Vec<ClaudeMessage> = rest.map(|m| convert_message(m, names)).collect();
    if turns.is_empty() {
        turns.push(ClaudeMessage {
            role: ClaudeRole::User,
            content: vec![ClaudeBlock::text(placeholder)],
        });
    }

    relocate_assistant_images(&mut turns);

    if let Some(prefill) = options.prefill.as_deref().map(str::trim_end)
        && !prefill.is_empty()
    {
        turns.push(ClaudeMessage {
            role: ClaudeRole::Assistant,
            content: vec![ClaudeBlock::text(prefill)],
        });
    }

    let mut messages = merge_same_role(turns);

    if !options.use_tools {
        for msg in &mut messages {
            msg.content = std::mem::take(&mut msg.content)
                .into_iter()
                .map(ClaudeBlock::into_plain_text)
                .collect();
        }
    }

    ClaudePrompt { messages, system }
}

fn convert_message(mut msg: Message, names: &PromptNames) -> ClaudeMessage {
    if msg.role == Role::Tool {
        let content = match std::mem::take(&mut msg.content) {
            Content::Text(s) => Value::String(s),
            parts @ Content::Parts(_) => Value::String(parts.into_text()),
        };
        return ClaudeMessage {
            role: ClaudeRole::User,
            content: vec![ClaudeBlock::ToolResult {
                tool_use_id: msg.tool_call_id.unwrap_or_default(),
                content,
                cache_control: None,
            }],
        };
    }

    let role = match msg.role {
        Role::Assistant => ClaudeRole::Assistant,
        _ => ClaudeRole::User,
    };
    apply_speaker_prefix(&mut msg, names);

    let mut content: Vec<ClaudeBlock> = match msg.content {
        Content::Text(text) if text.is_empty() && !msg.tool_calls.is_empty() => Vec::new(),
        Content::Text(text) => vec![ClaudeBlock::text(text)],
        Content::Parts(parts) => parts.into_iter().filter_map(convert_part).collect(),
    };

    if role == ClaudeRole::Assistant {
        content.extend(msg.tool_calls.iter().map(|call| ClaudeBlock::ToolUse {
            id: call.id.clone(),
            name: call.function.name.clone(),
            input: call.parsed_arguments(),
            cache_control: None,
        }));
    }
    if content.is_empty() {
        content.push(ClaudeBlock::text(""));
    }

    ClaudeMessage { role, content }
}

fn convert_part(part: ContentPart) -> Option<ClaudeBlock> {
    match part {
        ContentPart::Text { text } => Some(ClaudeBlock::text(text)),
        ContentPart::ImageUrl { image_url } => {
            let source = ImageSource::from_media(&image_url);
            if source.is_none() {
                tracing::debug!("dropping image with unsupported url scheme");
            }
            source.map(|source| ClaudeBlock::Image {
                source,
                cache_control: None,
            })
        }
        ContentPart::ToolUse { id, name, input } => Some(ClaudeBlock::ToolUse {
            id,
            name,
            input,
            cache_control: None,
        }),
        ContentPart::ToolResult {
            tool_use_id,
            content,
        } => Some(ClaudeBlock::ToolResult {
            tool_use_id,
            content,
            cache_control: None,
        }),
        ContentPart::VideoUrl { .. } | ContentPart::AudioUrl { .. } | ContentPart::Other(_) => {
            None
        }
    }
}

/// Moves image blocks off assistant turns onto the next user turn, after any
/// leading tool results.
fn relocate_assistant_images(turns: &mut Vec<ClaudeMessage>) {
    let mut i = 0;
    while i < turns.len() {
        if turns[i].role == ClaudeRole::Assistant && turns[i].content.iter().any(ClaudeBlock::is_image)
        {
            let (images, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut turns[i].content)
                .into_iter()
                .partition(ClaudeBlock::is_image);
            turns[i].content = if kept.is_empty() {
                vec![ClaudeBlock::text("")]
            } else {
                kept
            };

            match turns[i + 1..]
                .iter()
                .position(|t| t.role == ClaudeRole::User)
            {
                Some(offset) => {
                    // Last turn of the user run; tool_result blocks must
                    // still lead the turn once the run is merged.
                    let first = i + 1 + offset;
                    let run = turns[first..]
                        .iter()
                        .take_while(|t| t.role == ClaudeRole::User)
                        .count();
                    let target = &mut turns[first + run - 1].content;
                    let at = target
                        .iter()
                        .position(|b| !matches!(b, ClaudeBlock::ToolResult { .. }))
                        .unwrap_or(target.len());
                    target.splice(at..at, images);
                }
                None => turns.insert(
                    i + 1,
                    ClaudeMessage {
                        role: ClaudeRole::User,
                        content: images,
                    },
                ),
            }
        }
        i += 1;
    }
}

fn merge_same_role(turns: Vec<ClaudeMessage>) -> Vec<ClaudeMessage> {
    let mut merged: Vec<ClaudeMessage> = Vec::with_capacity(turns.len());
    for turn in turns {
        match merged.last_mut() {
            Some(last) if last.role == turn.role => last.content.extend(turn.content),
            _ => merged.push(turn),
        }
    }
    merged
}

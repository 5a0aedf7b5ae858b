//! Provider-agnostic conversation model.
//!
//! Every converter consumes a `Vec<Message>` built from the caller's JSON and
//! produces a provider-shaped value. Content is modelled as an explicit sum
//! type so that converters pattern-match instead of probing `type` strings.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Text used for the synthetic user turn inserted when a provider would
/// otherwise receive an empty prompt.
pub const DEFAULT_PLACEHOLDER: &str = "Let's get started.";

/// Speaker role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A URL wrapper as used by `image_url` / `video_url` / `audio_url` parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaUrl {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl MediaUrl {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            detail: None,
        }
    }

    /// Splits a `data:<mime>;base64,<payload>` URI into its pieces.
    ///
    /// Returns `None` for anything that is not a base64 data URI.
    #[must_use]
    pub fn data_uri(&self) -> Option<DataUri<'_>> {
        let rest = self.url.strip_prefix("data:")?;
        let (header, data) = rest.split_once(',')?;
        let mut params = header.split(';');
        let mime_type = params.next().filter(|m| !m.is_empty())?;
        if !params.any(|p| p == "base64") {
            return None;
        }
        Some(DataUri { mime_type, data })
    }
}

/// Borrowed view of a parsed base64 data URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUri<'a> {
    pub mime_type: &'a str,
    pub data: &'a str,
}

/// One element of structured message content.
///
/// Part types outside the modelled set are kept verbatim in
/// [`ContentPart::Other`] and serialized back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text {
        text: String,
    },
    ImageUrl {
        image_url: MediaUrl,
    },
    VideoUrl {
        video_url: MediaUrl,
    },
    AudioUrl {
        audio_url: MediaUrl,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: Value,
    },
    /// Any other part, as received.
    Other(Value),
}

/// Wire form of the modelled part types.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TaggedPart {
    Text {
        text: String,
    },
    ImageUrl {
        image_url: MediaUrl,
    },
    VideoUrl {
        video_url: MediaUrl,
    },
    AudioUrl {
        audio_url: MediaUrl,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Value,
    },
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TaggedPartRef<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: &'a MediaUrl },
    VideoUrl { video_url: &'a MediaUrl },
    AudioUrl { audio_url: &'a MediaUrl },
    ToolUse { id: &'a str, name: &'a str, input: &'a Value },
    ToolResult { tool_use_id: &'a str, content: &'a Value },
}

const MODELLED_TYPES: &[&str] = &[
    "text",
    "image_url",
    "video_url",
    "audio_url",
    "tool_use",
    "tool_result",
];

impl Serialize for ContentPart {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let tagged = match self {
            Self::Text { text } => TaggedPartRef::Text { text },
            Self::ImageUrl { image_url } => TaggedPartRef::ImageUrl { image_url },
            Self::VideoUrl { video_url } => TaggedPartRef::VideoUrl { video_url },
            Self::AudioUrl { audio_url } => TaggedPartRef::AudioUrl { audio_url },
            Self::ToolUse { id, name, input } => TaggedPartRef::ToolUse { id, name, input },
            Self::ToolResult {
                tool_use_id,
                content,
            } => TaggedPartRef::ToolResult {
                tool_use_id,
                content,
            },
            Self::Other(raw) => return raw.serialize(serializer),
        };
        tagged.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ContentPart {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        let modelled = raw
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|t| MODELLED_TYPES.contains(&t));
        if !modelled {
            return Ok(Self::Other(raw));
        }
        let part = TaggedPart::deserialize(raw).map_err(serde::de::Error::custom)?;
        Ok(match part {
            TaggedPart::Text { text } => Self::Text { text },
            TaggedPart::ImageUrl { image_url } => Self::ImageUrl { image_url },
            TaggedPart::VideoUrl { video_url } => Self::VideoUrl { video_url },
            TaggedPart::AudioUrl { audio_url } => Self::AudioUrl { audio_url },
            TaggedPart::ToolUse { id, name, input } => Self::ToolUse { id, name, input },
            TaggedPart::ToolResult {
                tool_use_id,
                content,
            } => Self::ToolResult {
                tool_use_id,
                content,
            },
        })
    }
}

impl ContentPart {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Returns the URL wrapper of an image, video or audio part.
    #[must_use]
    pub fn media(&self) -> Option<&MediaUrl> {
        match self {
            Self::ImageUrl { image_url: m }
            | Self::VideoUrl { video_url: m }
            | Self::AudioUrl { audio_url: m } => Some(m),
            _ => None,
        }
    }
}

/// Message content: either a plain string or an ordered list of parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Default for Content {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<ContentPart>> for Content {
    fn from(parts: Vec<ContentPart>) -> Self {
        Self::Parts(parts)
    }
}

impl Content {
    /// `true` when there is no text and no non-text part.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Parts(parts) => parts
                .iter()
                .all(|p| p.as_text().is_some_and(str::is_empty)),
        }
    }

    /// Concatenates the text of every text part with `separator`.
    ///
    /// Non-text parts are skipped.
    #[must_use]
    pub fn joined_text(&self, separator: &str) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(ContentPart::as_text)
                .collect::<Vec<_>>()
                .join(separator),
        }
    }

    /// Consumes the content and returns its text, parts joined by a blank line.
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Text(s) => s,
            parts @ Self::Parts(_) => parts.joined_text("\n\n"),
        }
    }

    /// Converts the content into a part list, wrapping plain text.
    #[must_use]
    pub fn into_parts(self) -> Vec<ContentPart> {
        match self {
            Self::Text(s) if s.is_empty() => Vec::new(),
            Self::Text(s) => vec![ContentPart::text(s)],
            Self::Parts(parts) => parts,
        }
    }

    /// Appends `other`, inserting `separator` between adjacent texts.
    ///
    /// Empty sides are absorbed without a separator.
    pub fn append(&mut self, other: Content, separator: &str) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = other;
            return;
        }
        match (std::mem::take(self), other) {
            (Self::Text(mut a), Self::Text(b)) => {
                a.push_str(separator);
                a.push_str(&b);
                *self = Self::Text(a);
            }
            (a, b) => {
                let mut parts = a.into_parts();
                for part in b.into_parts() {
                    match (parts.last_mut(), part) {
                        (Some(ContentPart::Text { text: last }), ContentPart::Text { text }) => {
                            last.push_str(separator);
                            last.push_str(&text);
                        }
                        (_, part) => parts.push(part),
                    }
                }
                *self = Self::Parts(parts);
            }
        }
    }
}

/// An assistant-issued function invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

/// Function name plus its JSON-encoded arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

impl ToolCall {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: function_kind(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    /// Parses the argument string; malformed JSON yields an empty object.
    #[must_use]
    pub fn parsed_arguments(&self) -> Value {
        serde_json::from_str(&self.function.arguments)
            .unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
    }
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: Content,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Mistral continuation marker; only serialized when set.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub prefix: bool,
}

fn null_as_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<Content>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
            prefix: false,
        }
    }

    #[must_use]
    pub fn system(content: impl Into<Content>) -> Self {
        Self::new(Role::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<Content>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<Content>) -> Self {
        Self::new(Role::Assistant, content)
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The non-empty display name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }
}

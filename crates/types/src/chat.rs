//! Strongly-typed generation request body.
//!
//! The fields every provider needs (`model`, `stream`, `messages`, `prompt`)
//! are typed; everything else (sampling parameters, provider flags, names)
//! stays in [`GenerateRequest::params`] so that allow-lists can pick from it.

use crate::{Message, PromptNames, RelayError, error::Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A flat text prompt, or messages that will be flattened into one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PromptInput {
    Text(String),
    Messages(Vec<Message>),
}

/// A generation request as sent by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// The model identifier (e.g., `"claude-sonnet-4-5"`, `"llama3"`).
    #[serde(default)]
    pub model: String,
    /// Whether to relay the upstream event stream.
    #[serde(default)]
    pub stream: bool,
    /// Conversation turns for chat providers.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Flat prompt for text-completion providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<PromptInput>,
    /// All remaining fields not captured above.
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl GenerateRequest {
    /// Parses a raw JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Conversion`] if the body is not an object or a
    /// typed field has the wrong shape (e.g. `messages` is not an array).
    pub fn from_body(body: Value) -> Result<Self> {
        if !body.is_object() {
            return Err(RelayError::Conversion(
                "request body must be a JSON object".into(),
            ));
        }
        serde_json::from_value(body).map_err(|e| RelayError::Conversion(e.to_string()))
    }

    /// Returns the model name, or an error if the caller left it out.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::MissingField`] when `model` is empty.
    pub fn require_model(&self) -> Result<&str> {
        if self.model.is_empty() {
            Err(RelayError::MissingField("model".into()))
        } else {
            Ok(&self.model)
        }
    }

    /// Speaker names for prefixing.
    #[must_use]
    pub fn names(&self) -> PromptNames {
        PromptNames::from_params(&self.params)
    }

    /// A boolean flag from the extra parameters.
    #[must_use]
    pub fn flag(&self, key: &str) -> Option<bool> {
        self.params.get(key).and_then(Value::as_bool)
    }

    /// A non-empty string parameter.
    #[must_use]
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// `true` when the caller supplied a non-empty `tools` array.
    #[must_use]
    pub fn has_tools(&self) -> bool {
        self.params
            .get("tools")
            .and_then(Value::as_array)
            .is_some_and(|t| !t.is_empty())
    }
}

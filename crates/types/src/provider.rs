//! Provider identifiers and API surface definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a supported upstream generation provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Claude,
    MakerSuite,
    Cohere,
    Ai21,
    MistralAi,
    DeepSeek,
    Perplexity,
    Custom,
    OpenRouter,
    OpenAi,
    XAi,
    Ollama,
    TogetherAi,
    InfermaticAi,
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderId {
    type Err = crate::RelayError;

    /// Parse a provider source tag or well-known alias into a [`ProviderId`].
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::UnknownProvider`](crate::RelayError::UnknownProvider)
    /// if the string does not match any known provider tag or alias.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "claude" | "anthropic" => Ok(Self::Claude),
            "makersuite" | "google" | "gemini" => Ok(Self::MakerSuite),
            "cohere" => Ok(Self::Cohere),
            "ai21" => Ok(Self::Ai21),
            "mistralai" | "mistral" => Ok(Self::MistralAi),
            "deepseek" => Ok(Self::DeepSeek),
            "perplexity" => Ok(Self::Perplexity),
            "custom" => Ok(Self::Custom),
            "openrouter" => Ok(Self::OpenRouter),
            "openai" => Ok(Self::OpenAi),
            "xai" | "grok" => Ok(Self::XAi),
            "ollama" => Ok(Self::Ollama),
            "togetherai" | "together" => Ok(Self::TogetherAi),
            "infermaticai" | "infermatic" => Ok(Self::InfermaticAi),
            _ => Err(crate::RelayError::UnknownProvider(s.to_string())),
        }
    }
}

impl ProviderId {
    /// Returns all known provider variants.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[
            Self::Claude,
            Self::MakerSuite,
            Self::Cohere,
            Self::Ai21,
            Self::MistralAi,
            Self::DeepSeek,
            Self::Perplexity,
            Self::Custom,
            Self::OpenRouter,
            Self::OpenAi,
            Self::XAi,
            Self::Ollama,
            Self::TogetherAi,
            Self::InfermaticAi,
        ]
    }

    /// The canonical source tag, as sent in `chat_completion_source` / `api_type`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::MakerSuite => "makersuite",
            Self::Cohere => "cohere",
            Self::Ai21 => "ai21",
            Self::MistralAi => "mistralai",
            Self::DeepSeek => "deepseek",
            Self::Perplexity => "perplexity",
            Self::Custom => "custom",
            Self::OpenRouter => "openrouter",
            Self::OpenAi => "openai",
            Self::XAi => "xai",
            Self::Ollama => "ollama",
            Self::TogetherAi => "togetherai",
            Self::InfermaticAi => "infermaticai",
        }
    }

    /// Which public API surface serves this provider.
    #[must_use]
    pub fn api_kind(self) -> ApiKind {
        match self {
            Self::Ollama | Self::TogetherAi | Self::InfermaticAi => ApiKind::Text,
            _ => ApiKind::Chat,
        }
    }
}

/// The two generation surfaces exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKind {
    /// Structured chat turns (`/chat-completions/generate`).
    Chat,
    /// Flat string prompts (`/text-completions/generate`).
    Text,
}

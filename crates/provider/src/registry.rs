//! Static provider table: one [`ProviderSpec`] per [`ProviderId`].

use crate::allow_list::{
    AI21_KEYS, CLAUDE_KEYS, CLAUDE_RENAMES, COHERE_KEYS, COHERE_RENAMES, CUSTOM_KEYS,
    INFERMATICAI_KEYS, MAKERSUITE_KEYS, MAKERSUITE_RENAMES, MISTRAL_KEYS, MISTRAL_RENAMES,
    OLLAMA_KEYS, OLLAMA_RENAMES, OPENAI_KEYS, OPENROUTER_KEYS, PERPLEXITY_KEYS, TEXT_RENAMES,
    TOGETHERAI_KEYS,
};
use promptrelay_translate::{PostProcessing, ReplyShape};
use promptrelay_types::ProviderId;

/// How the credential is attached to the outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <key>`.
    Bearer,
    /// `x-api-key: <key>`.
    XApiKey,
    /// `x-goog-api-key: <key>`.
    GoogleApiKey,
}

/// Whether a request may proceed without a stored credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential {
    Required,
    Optional,
}

/// Which prompt converter shapes the outbound body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverterKind {
    Claude,
    MakerSuite,
    Cohere,
    Ai21,
    Mistral,
    /// Generic merge with a fixed preset.
    Merge(PostProcessing),
    /// Generic merge with the preset named in the request.
    RequestedMerge,
    /// Messages forwarded as sent.
    PassThrough,
    /// A single flattened prompt string.
    TextPrompt,
}

/// Everything dispatch needs to know about one provider.
#[derive(Debug, Clone, Copy)]
pub struct ProviderSpec {
    pub id: ProviderId,
    /// Default API base, without a trailing slash. Empty when the caller must
    /// supply one.
    pub base_url: &'static str,
    /// Generation endpoint appended to the base.
    pub path: &'static str,
    /// Model listing endpoint, if the provider has one.
    pub models_path: Option<&'static str>,
    pub credential_key: &'static str,
    pub credential: Credential,
    pub auth: AuthScheme,
    pub converter: ConverterKind,
    pub allow_list: &'static [&'static str],
    pub renames: &'static [(&'static str, &'static str)],
    pub headers: &'static [(&'static str, &'static str)],
    pub reply: ReplyShape,
}

/// Anthropic API version header value.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
/// Beta flag required for one-hour cache TTLs.
pub const ANTHROPIC_EXTENDED_TTL_BETA: &str = "extended-cache-ttl-2025-04-11";

/// Returns the static spec for `id`.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn spec(id: ProviderId) -> ProviderSpec {
    let openai_like = |base_url: &'static str,
                       credential_key: &'static str,
                       converter: ConverterKind,
                       allow_list: &'static [&'static str]| ProviderSpec {
        id,
        base_url,
        path: "/chat/completions",
        models_path: Some("/models"),
        credential_key,
        credential: Credential::Required,
        auth: AuthScheme::Bearer,
        converter,
        allow_list,
        renames: &[],
        headers: &[],
        reply: ReplyShape::OpenAi,
    };

    match id {
        ProviderId::Claude => ProviderSpec {
            id,
            base_url: "https://api.anthropic.com/v1",
            path: "/messages",
            models_path: Some("/models"),
            credential_key: "api_key_claude",
            credential: Credential::Required,
            auth: AuthScheme::XApiKey,
            converter: ConverterKind::Claude,
            allow_list: CLAUDE_KEYS,
            renames: CLAUDE_RENAMES,
            headers: &[("anthropic-version", ANTHROPIC_VERSION)],
            reply: ReplyShape::Claude,
        },
        ProviderId::MakerSuite => ProviderSpec {
            id,
            base_url: "https://generativelanguage.googleapis.com/v1beta",
            path: "/models",
            models_path: Some("/models"),
            credential_key: "api_key_makersuite",
            credential: Credential::Required,
            auth: AuthScheme::GoogleApiKey,
            converter: ConverterKind::MakerSuite,
            allow_list: MAKERSUITE_KEYS,
            renames: MAKERSUITE_RENAMES,
            headers: &[],
            reply: ReplyShape::MakerSuite,
        },
        ProviderId::Cohere => ProviderSpec {
            id,
            base_url: "https://api.cohere.ai",
            path: "/v2/chat",
            models_path: Some("/v1/models"),
            credential_key: "api_key_cohere",
            credential: Credential::Required,
            auth: AuthScheme::Bearer,
            converter: ConverterKind::Cohere,
            allow_list: COHERE_KEYS,
            renames: COHERE_RENAMES,
            headers: &[],
            reply: ReplyShape::Cohere,
        },
        ProviderId::Ai21 => ProviderSpec {
            models_path: None,
            ..openai_like(
                "https://api.ai21.com/studio/v1",
                "api_key_ai21",
                ConverterKind::Ai21,
                AI21_KEYS,
            )
        },
        ProviderId::MistralAi => ProviderSpec {
            renames: MISTRAL_RENAMES,
            ..openai_like(
                "https://api.mistral.ai/v1",
                "api_key_mistralai",
                ConverterKind::Mistral,
                MISTRAL_KEYS,
            )
        },
        ProviderId::DeepSeek => openai_like(
            "https://api.deepseek.com/beta",
            "api_key_deepseek",
            ConverterKind::Merge(PostProcessing::SemiTools),
            OPENAI_KEYS,
        ),
        ProviderId::Perplexity => ProviderSpec {
            models_path: None,
            ..openai_like(
                "https://api.perplexity.ai",
                "api_key_perplexity",
                ConverterKind::Merge(PostProcessing::Strict),
                PERPLEXITY_KEYS,
            )
        },
        ProviderId::Custom => ProviderSpec {
            credential: Credential::Optional,
            ..openai_like("", "api_key_custom", ConverterKind::RequestedMerge, CUSTOM_KEYS)
        },
        ProviderId::OpenRouter => ProviderSpec {
            headers: &[
                ("HTTP-Referer", "https://github.com/promptrelay/promptrelay"),
                ("X-Title", "promptrelay"),
            ],
            ..openai_like(
                "https://openrouter.ai/api/v1",
                "api_key_openrouter",
                ConverterKind::PassThrough,
                OPENROUTER_KEYS,
            )
        },
        ProviderId::OpenAi => openai_like(
            "https://api.openai.com/v1",
            "api_key_openai",
            ConverterKind::PassThrough,
            OPENAI_KEYS,
        ),
        ProviderId::XAi => openai_like(
            "https://api.x.ai/v1",
            "api_key_xai",
            ConverterKind::PassThrough,
            OPENAI_KEYS,
        ),
        ProviderId::Ollama => ProviderSpec {
            id,
            base_url: "http://127.0.0.1:11434",
            path: "/api/generate",
            models_path: Some("/api/tags"),
            credential_key: "api_key_ollama",
            credential: Credential::Optional,
            auth: AuthScheme::Bearer,
            converter: ConverterKind::TextPrompt,
            allow_list: OLLAMA_KEYS,
            renames: OLLAMA_RENAMES,
            headers: &[],
            reply: ReplyShape::Ollama,
        },
        ProviderId::TogetherAi => ProviderSpec {
            path: "/v1/completions",
            models_path: Some("/v1/models"),
            renames: TEXT_RENAMES,
            reply: ReplyShape::TextCompletion,
            ..openai_like(
                "https://api.together.xyz",
                "api_key_togetherai",
                ConverterKind::TextPrompt,
                TOGETHERAI_KEYS,
            )
        },
        ProviderId::InfermaticAi => ProviderSpec {
            path: "/v1/completions",
            models_path: Some("/v1/models"),
            renames: TEXT_RENAMES,
            reply: ReplyShape::TextCompletion,
            ..openai_like(
                "https://api.totalgpt.ai",
                "api_key_infermaticai",
                ConverterKind::TextPrompt,
                INFERMATICAI_KEYS,
            )
        },
    }
}

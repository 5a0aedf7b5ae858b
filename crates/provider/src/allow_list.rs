//! Per-provider parameter allow-lists.
//!
//! Each list names the keys a provider's API accepts, in the provider's own
//! spelling. Request parameters are renamed first and then filtered; anything
//! not on the list is dropped.

use serde_json::{Map, Value};

/// Parameters shared by OpenAI-compatible chat APIs.
pub const OPENAI_KEYS: &[&str] = &[
    "temperature",
    "top_p",
    "max_tokens",
    "max_completion_tokens",
    "stop",
    "presence_penalty",
    "frequency_penalty",
    "seed",
    "n",
    "logit_bias",
    "logprobs",
    "top_logprobs",
    "tools",
    "tool_choice",
    "response_format",
    "reasoning_effort",
    "user",
];

pub const CLAUDE_KEYS: &[&str] = &[
    "max_tokens",
    "temperature",
    "top_p",
    "top_k",
    "stop_sequences",
    "metadata",
];
pub const CLAUDE_RENAMES: &[(&str, &str)] = &[("stop", "stop_sequences")];

/// Keys that go into Gemini's `generationConfig`.
pub const MAKERSUITE_KEYS: &[&str] = &[
    "maxOutputTokens",
    "temperature",
    "topP",
    "topK",
    "stopSequences",
    "candidateCount",
    "presencePenalty",
    "frequencyPenalty",
    "seed",
    "responseMimeType",
];
pub const MAKERSUITE_RENAMES: &[(&str, &str)] = &[
    ("max_tokens", "maxOutputTokens"),
    ("top_p", "topP"),
    ("top_k", "topK"),
    ("stop", "stopSequences"),
    ("n", "candidateCount"),
    ("presence_penalty", "presencePenalty"),
    ("frequency_penalty", "frequencyPenalty"),
];

pub const COHERE_KEYS: &[&str] = &[
    "max_tokens",
    "temperature",
    "p",
    "k",
    "stop_sequences",
    "frequency_penalty",
    "presence_penalty",
    "seed",
    "tools",
];
pub const COHERE_RENAMES: &[(&str, &str)] = &[("top_p", "p"), ("top_k", "k"), ("stop", "stop_sequences")];

pub const AI21_KEYS: &[&str] = &["max_tokens", "temperature", "top_p", "stop", "n", "tools"];

pub const MISTRAL_KEYS: &[&str] = &[
    "max_tokens",
    "temperature",
    "top_p",
    "stop",
    "random_seed",
    "presence_penalty",
    "frequency_penalty",
    "n",
    "tools",
    "tool_choice",
    "response_format",
    "safe_prompt",
];
pub const MISTRAL_RENAMES: &[(&str, &str)] = &[("seed", "random_seed")];

pub const PERPLEXITY_KEYS: &[&str] = &[
    "max_tokens",
    "temperature",
    "top_p",
    "top_k",
    "presence_penalty",
    "frequency_penalty",
    "search_recency_filter",
];

pub const OPENROUTER_KEYS: &[&str] = &[
    "temperature",
    "top_p",
    "top_k",
    "top_a",
    "min_p",
    "repetition_penalty",
    "max_tokens",
    "stop",
    "presence_penalty",
    "frequency_penalty",
    "seed",
    "n",
    "logit_bias",
    "tools",
    "tool_choice",
    "response_format",
    "include_reasoning",
    "transforms",
    "provider",
    "route",
];

/// OpenAI keys plus the sampler extensions common on self-hosted servers.
pub const CUSTOM_KEYS: &[&str] = &[
    "temperature",
    "top_p",
    "top_k",
    "min_p",
    "repetition_penalty",
    "max_tokens",
    "max_completion_tokens",
    "stop",
    "presence_penalty",
    "frequency_penalty",
    "seed",
    "n",
    "logit_bias",
    "logprobs",
    "tools",
    "tool_choice",
    "response_format",
    "reasoning_effort",
];

/// Keys forwarded inside Ollama's `options` object.
pub const OLLAMA_KEYS: &[&str] = &[
    "num_predict",
    "num_ctx",
    "num_batch",
    "stop",
    "temperature",
    "repeat_penalty",
    "presence_penalty",
    "frequency_penalty",
    "top_k",
    "top_p",
    "tfs_z",
    "typical_p",
    "seed",
    "repeat_last_n",
    "min_p",
    "mirostat",
    "mirostat_tau",
    "mirostat_eta",
];
pub const OLLAMA_RENAMES: &[(&str, &str)] = &[
    ("max_tokens", "num_predict"),
    ("repetition_penalty", "repeat_penalty"),
    ("rep_pen", "repeat_penalty"),
];

pub const TOGETHERAI_KEYS: &[&str] = &[
    "max_tokens",
    "temperature",
    "top_p",
    "top_k",
    "min_p",
    "repetition_penalty",
    "presence_penalty",
    "frequency_penalty",
    "stop",
    "seed",
    "logprobs",
];

pub const INFERMATICAI_KEYS: &[&str] = &[
    "max_tokens",
    "temperature",
    "top_p",
    "top_k",
    "min_p",
    "repetition_penalty",
    "presence_penalty",
    "frequency_penalty",
    "stop",
    "seed",
    "n",
    "best_of",
    "ignore_eos",
];

/// Text-completion samplers sent under OpenAI-style names.
pub const TEXT_RENAMES: &[(&str, &str)] = &[("rep_pen", "repetition_penalty")];

/// Copies the allowed, non-null entries of `params` after renaming.
///
/// `keys` is matched against the renamed key. When a source key and its
/// rename target are both present, the explicitly named target wins.
#[must_use]
pub fn pick(params: &Map<String, Value>, keys: &[&str], renames: &[(&str, &str)]) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in params {
        if value.is_null() {
            continue;
        }
        let renamed = renames
            .iter()
            .find(|(from, _)| *from == key.as_str())
            .map(|(_, to)| *to);
        let target = renamed.unwrap_or(key.as_str());
        if !keys.contains(&target) {
            continue;
        }
        if renamed.is_some() && params.get(target).is_some_and(|v| !v.is_null()) {
            continue;
        }
        out.insert(target.to_string(), value.clone());
    }
    out
}

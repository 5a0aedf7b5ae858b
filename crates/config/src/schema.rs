use promptrelay_types::{CredentialSource, DEFAULT_PLACEHOLDER, ProviderId};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path};

/// Prefix of environment variables layered over the file configuration.
pub const ENV_PREFIX: &str = "PROMPTRELAY_";

fn default_true() -> bool {
    true
}

/// Configuration for a single provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Overrides the built-in API base URL.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Whether this provider is enabled (defaults to `true`).
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            enabled: true,
        }
    }
}

fn default_cache_ttl() -> String {
    "5m".to_string()
}

/// Claude-specific prompt settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeConfig {
    /// Send leading system turns as the out-of-band system prompt.
    #[serde(default = "default_true")]
    pub use_system_prompt: bool,
    /// Role-switch depth to place cache markers at; unset disables caching.
    #[serde(default)]
    pub caching_at_depth: Option<usize>,
    /// Cache TTL, `"5m"` or `"1h"`.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: String,
    /// Also mark the last system block as cacheable.
    #[serde(default)]
    pub cache_system_prompt: bool,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            use_system_prompt: true,
            caching_at_depth: None,
            cache_ttl: default_cache_ttl(),
            cache_system_prompt: false,
        }
    }
}

/// OpenRouter prompt caching for Claude models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    #[serde(default)]
    pub caching_at_depth: Option<usize>,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: String,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            caching_at_depth: None,
            cache_ttl: default_cache_ttl(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MistralConfig {
    /// Mark a trailing assistant turn as a continuation prefix.
    #[serde(default)]
    pub enable_prefix: bool,
}

fn default_retries() -> u32 {
    5
}
fn default_initial_delay_ms() -> u64 {
    5000
}

/// Backoff for upstream rate limiting (HTTP 429).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Delay before the first retry; doubled for each subsequent one.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_port() -> u16 {
    8018
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_placeholder() -> String {
    DEFAULT_PLACEHOLDER.to_string()
}
fn default_models_cache_ttl() -> u64 {
    300
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Listen port (defaults to 8018).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Listen address (defaults to `127.0.0.1`).
    #[serde(default = "default_host")]
    pub host: String,
    /// Outbound HTTP(S) proxy for upstream calls.
    #[serde(default)]
    pub proxy_url: Option<String>,
    /// Text of the user turn inserted where a provider rejects an empty prompt.
    #[serde(default = "default_placeholder")]
    pub prompt_placeholder: String,
    /// Provider secrets keyed by credential key, e.g. `api_key_claude`.
    #[serde(default)]
    pub secrets: HashMap<String, String>,
    /// Per-provider overrides.
    #[serde(default)]
    pub providers: HashMap<ProviderId, ProviderConfig>,
    #[serde(default)]
    pub claude: ClaudeConfig,
    #[serde(default)]
    pub openrouter: OpenRouterConfig,
    #[serde(default)]
    pub mistral: MistralConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    /// How long a provider's model listing is served from cache.
    #[serde(default = "default_models_cache_ttl")]
    pub models_cache_ttl_secs: u64,
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            proxy_url: None,
            prompt_placeholder: default_placeholder(),
            secrets: HashMap::new(),
            providers: HashMap::new(),
            claude: ClaudeConfig::default(),
            openrouter: OpenRouterConfig::default(),
            mistral: MistralConfig::default(),
            retry: RetryConfig::default(),
            models_cache_ttl_secs: default_models_cache_ttl(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Parses configuration from a YAML string, merged with defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the YAML is invalid or extraction fails.
    #[allow(clippy::result_large_err)]
    pub fn from_yaml(yaml: &str) -> Result<Self, figment::Error> {
        use figment::{
            Figment,
            providers::{Format as _, Serialized, Yaml},
        };
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::string(yaml))
            .extract()
    }

    /// Loads defaults, then the YAML file at `path` if given, then
    /// `PROMPTRELAY_*` environment variables (`__` separates nested keys).
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the file cannot be read or parsed.
    #[allow(clippy::result_large_err)]
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        use figment::{
            Figment,
            providers::{Env, Format as _, Serialized, Yaml},
        };
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__")).extract()
    }

    /// Returns the provider's overrides, or the defaults when none are set.
    #[must_use]
    pub fn provider(&self, id: ProviderId) -> ProviderConfig {
        self.providers.get(&id).cloned().unwrap_or_default()
    }

    /// The configured placeholder, falling back to the built-in one when blank.
    #[must_use]
    pub fn placeholder(&self) -> &str {
        if self.prompt_placeholder.trim().is_empty() {
            DEFAULT_PLACEHOLDER
        } else {
            &self.prompt_placeholder
        }
    }
}

impl CredentialSource for Config {
    fn credential(&self, key: &str) -> Option<String> {
        self.secrets.credential(key)
    }
}

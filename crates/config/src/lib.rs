//! Configuration loading and hot-reloading for the promptrelay server.
//!
//! Uses figment for layered configuration (defaults, YAML file, then
//! `PROMPTRELAY_*` environment variables), and notify + arc-swap for live
//! file watching.

pub mod schema;
pub mod watcher;

pub use schema::{
    ClaudeConfig, Config, LogConfig, LogFormat, MistralConfig, OpenRouterConfig, ProviderConfig,
    RetryConfig,
};
pub use watcher::ConfigWatcher;

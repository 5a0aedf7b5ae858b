//! HTTP proxy layer: axum router, route handlers, and error mapping.
//!
//! Exposes the chat and text generation endpoints plus a cached model
//! listing. Every handler reads one configuration snapshot, builds the
//! upstream call through [`promptrelay_provider::Dispatcher`], and hands the
//! reply to [`forward`].

mod error;
pub mod forward;
mod generate;
mod status;

pub use error::ApiError;

use arc_swap::ArcSwap;
use axum::{Router, routing::post};
use promptrelay_config::Config;
use promptrelay_provider::{ExpiringCache, ProviderHttp};
use promptrelay_types::ProviderId;
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tower_http::trace::TraceLayer;

/// Shared application state passed to all route handlers.
pub struct AppState {
    /// Server configuration. Atomically swappable for hot-reloading.
    pub config: Arc<ArcSwap<Config>>,
    /// HTTP client for upstream requests.
    pub http: ProviderHttp,
    /// Model listings per provider.
    pub models: ExpiringCache<ProviderId, Value>,
}

impl AppState {
    /// Creates a new shared application state wrapped in an `Arc`.
    ///
    /// If the config specifies a `proxy_url`, the HTTP client is built with
    /// that proxy.
    pub fn new(config: Arc<ArcSwap<Config>>) -> Arc<Self> {
        let proxy_url = config.load().proxy_url.clone();
        let http = ProviderHttp::with_proxy(proxy_url.as_deref()).unwrap_or_else(|e| {
            tracing::warn!(url = ?proxy_url, error = %e, "invalid proxy_url, using direct connection");
            ProviderHttp::new(reqwest::Client::new())
        });
        Self::with_http(config, http)
    }

    /// Creates the state around an existing HTTP client.
    pub fn with_http(config: Arc<ArcSwap<Config>>, http: ProviderHttp) -> Arc<Self> {
        let ttl = Duration::from_secs(config.load().models_cache_ttl_secs);
        Arc::new(Self {
            config,
            http,
            models: ExpiringCache::new(ttl),
        })
    }
}

/// Build the full axum router.
///
/// Routes:
/// - POST /api/backends/chat-completions/generate
/// - POST /api/backends/chat-completions/status
/// - POST /api/backends/text-completions/generate
pub fn make_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/api/backends/chat-completions/generate",
            post(generate::chat_generate),
        )
        .route(
            "/api/backends/chat-completions/status",
            post(status::chat_status),
        )
        .route(
            "/api/backends/text-completions/generate",
            post(generate::text_generate),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

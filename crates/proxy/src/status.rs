//! Model listing for the chat surface, cached per provider.

use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use promptrelay_provider::{Dispatcher, RetryPolicy};
use promptrelay_types::{ApiKind, ProviderResponse, RelayError};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

use crate::{
    AppState,
    error::ApiError,
    generate::{CHAT_SOURCE, provider_of},
};

/// Body fields that point the listing at a caller-chosen server.
const URL_OVERRIDES: &[&str] = &["custom_url", "api_server"];

/// Handles `POST /api/backends/chat-completions/status`.
///
/// Listings fetched from a request-supplied URL are not cached, since the
/// cache is keyed by provider alone.
///
/// # Errors
///
/// Returns [`ApiError`] if the provider is unknown, has no listing endpoint,
/// or the upstream call fails.
pub async fn chat_status(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let provider = provider_of(&body, CHAT_SOURCE, ApiKind::Chat)?;
    let params = body.as_object().cloned().unwrap_or_default();
    let cacheable = !URL_OVERRIDES.iter().any(|key| {
        params
            .get(*key)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty())
    });

    if cacheable && let Some(models) = state.models.get(&provider) {
        tracing::debug!(provider = %provider, "model listing served from cache");
        return Ok(Json(models).into_response());
    }

    let config = state.config.load_full();
    let outbound = Dispatcher::new(&config, &*config).prepare_models(provider, &params)?;
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let policy = RetryPolicy::from(&config.retry);

    let models = match state.http.execute(&outbound, &policy, &cancel).await? {
        ProviderResponse::Complete(models) => models,
        ProviderResponse::Stream(_) => {
            return Err(RelayError::MalformedResponse("model listing was streamed".into()).into());
        }
    };
    if cacheable {
        let ttl = Duration::from_secs(config.models_cache_ttl_secs);
        state.models.set_with_ttl(provider, models.clone(), ttl);
    }
    tracing::info!(provider = %provider, "model listing fetched");
    Ok(Json(models).into_response())
}

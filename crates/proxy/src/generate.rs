//! Generation handlers for the chat and text completion surfaces.

use axum::{Json, extract::State, response::Response};
use promptrelay_provider::{Dispatcher, RetryPolicy};
use promptrelay_types::{
    ApiKind, GenerateRequest, ProviderId, ProviderResponse, RelayError, Result,
};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::{AppState, error::ApiError, forward};

/// Body field naming the provider on the chat surface.
pub(crate) const CHAT_SOURCE: &str = "chat_completion_source";
/// Body field naming the provider on the text surface.
pub(crate) const TEXT_SOURCE: &str = "api_type";

/// Reads the provider tag in `field` and checks it belongs to `kind`.
pub(crate) fn provider_of(body: &Value, field: &str, kind: ApiKind) -> Result<ProviderId> {
    let tag = body
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| RelayError::MissingField(field.to_string()))?;
    let provider: ProviderId = tag.parse()?;
    if provider.api_kind() == kind {
        Ok(provider)
    } else {
        Err(RelayError::UnknownProvider(tag.to_string()))
    }
}

/// Handles `POST /api/backends/chat-completions/generate`.
///
/// # Errors
///
/// Returns [`ApiError`] if the provider is unknown, a credential or field
/// is missing, or the upstream call fails.
pub async fn chat_generate(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> std::result::Result<Response, ApiError> {
    let provider = provider_of(&body, CHAT_SOURCE, ApiKind::Chat)?;
    generate(&state, provider, body).await
}

/// Handles `POST /api/backends/text-completions/generate`.
///
/// # Errors
///
/// Same as [`chat_generate`], keyed on `api_type`.
pub async fn text_generate(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> std::result::Result<Response, ApiError> {
    let provider = provider_of(&body, TEXT_SOURCE, ApiKind::Text)?;
    generate(&state, provider, body).await
}

async fn generate(
    state: &AppState,
    provider: ProviderId,
    body: Value,
) -> std::result::Result<Response, ApiError> {
    let config = state.config.load_full();
    let request = GenerateRequest::from_body(body)?;
    let outbound = Dispatcher::new(&config, &*config).prepare(provider, request)?;
    tracing::info!(
        provider = %provider,
        url = %outbound.url,
        stream = outbound.stream,
        "generate request"
    );

    // Dropped with the handler future when the client disconnects early.
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let policy = RetryPolicy::from(&config.retry);

    match state.http.execute(&outbound, &policy, &cancel).await? {
        ProviderResponse::Stream(reply) => {
            tracing::debug!(provider = %provider, status = reply.status, "relaying stream");
            Ok(forward::relay_stream(reply, guard))
        }
        ProviderResponse::Complete(reply) => Ok(forward::complete(&outbound, reply)?),
    }
}

//! Hands upstream replies back to the caller.

use axum::{
    Json,
    body::Body,
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use futures_util::StreamExt as _;
use promptrelay_provider::OutboundRequest;
use promptrelay_translate::normalize_reply;
use promptrelay_types::{RelayError, Result, StreamingReply};
use serde_json::Value;
use tokio_util::sync::DropGuard;

/// The status a relayed stream is answered with.
///
/// An upstream 401 means the caller's stored key was rejected; browsers
/// treat a 401 from this server as a prompt for our own credentials.
#[must_use]
pub fn relay_status(upstream: u16) -> StatusCode {
    match upstream {
        401 => StatusCode::BAD_REQUEST,
        other => StatusCode::from_u16(other).unwrap_or(StatusCode::BAD_GATEWAY),
    }
}

/// Pipes an upstream stream to the caller byte for byte.
///
/// `guard` lives as long as the body. When the client disconnects the body
/// is dropped, the guard cancels the request, and the upstream stream goes
/// with it.
pub fn relay_stream(reply: StreamingReply, guard: DropGuard) -> Response {
    let status = relay_status(reply.status);
    let content_type = reply
        .content_type
        .as_deref()
        .and_then(|v| HeaderValue::from_str(v).ok());

    let body = reply.body.map(move |chunk| {
        let _request = &guard;
        chunk.map_err(|e| std::io::Error::other(e.to_string()))
    });

    let mut response = Response::new(Body::from_stream(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    if let Some(content_type) = content_type {
        headers.insert(CONTENT_TYPE, content_type);
    }
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

/// Normalizes a complete upstream reply into the chat envelope.
///
/// # Errors
///
/// Returns [`RelayError::MalformedResponse`] when the reply lacks the
/// provider's reply field.
pub fn complete(outbound: &OutboundRequest, reply: Value) -> Result<Response> {
    match normalize_reply(outbound.reply, reply, outbound.include_thoughts) {
        Ok(envelope) => Ok(Json(envelope).into_response()),
        Err(e) => {
            if matches!(e, RelayError::MalformedResponse(_)) {
                tracing::error!(provider = %outbound.provider, error = %e, "upstream reply could not be normalized");
            }
            Err(e)
        }
    }
}

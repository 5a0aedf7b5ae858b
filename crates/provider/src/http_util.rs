//! Shared HTTP plumbing for upstream calls.
//!
//! One place for send → status-check → stream-or-complete, with the 429
//! retry loop and request cancellation applied uniformly.

use crate::{dispatch::OutboundRequest, retry::RetryPolicy};
use futures_util::StreamExt as _;
use promptrelay_types::{ByteStream, ProviderResponse, RelayError, Result, StreamingReply};
use reqwest::{Client, RequestBuilder, Response, header::CONTENT_TYPE};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Cloneable handle around the shared `reqwest` client.
#[derive(Clone)]
pub struct ProviderHttp {
    http: Client,
}

impl ProviderHttp {
    /// Creates a new helper wrapping the given HTTP client.
    #[must_use]
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    /// Builds a client, routing through `proxy_url` when one is set.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Http`] if the proxy URL is invalid or the client
    /// cannot be built.
    pub fn with_proxy(proxy_url: Option<&str>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(url) = proxy_url.filter(|u| !u.trim().is_empty()) {
            builder = builder.proxy(reqwest::Proxy::all(url)?);
        }
        Ok(Self::new(builder.build()?))
    }

    /// Returns a reference to the inner HTTP client.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.http
    }

    fn request(&self, outbound: &OutboundRequest) -> RequestBuilder {
        let mut builder = match &outbound.body {
            Some(body) => self.http.post(&outbound.url).json(body),
            None => self.http.get(&outbound.url),
        };
        for (name, value) in &outbound.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
    }

    /// Sends a request and checks for success status.
    ///
    /// On non-2xx responses, reads the body text and returns
    /// [`RelayError::Upstream`].
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Upstream` on non-success HTTP status codes,
    /// or a transport error if the request fails to send.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let resp = builder.send().await?;
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            let text = resp.text().await.unwrap_or_default();
            Err(RelayError::Upstream {
                status: status.as_u16(),
                body: text,
            })
        }
    }

    /// Performs the upstream call described by `outbound`.
    ///
    /// Streaming calls are attempted once and handed back with the upstream
    /// status untouched, whatever it is. Complete calls go through `policy`
    /// and return the parsed JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Cancelled`] once `cancel` fires, or the transport,
    /// status or decode error of the last attempt.
    pub async fn execute(
        &self,
        outbound: &OutboundRequest,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<ProviderResponse> {
        if outbound.stream {
            let resp = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(RelayError::Cancelled),
                resp = self.request(outbound).send() => resp?,
            };
            let status = resp.status().as_u16();
            if !resp.status().is_success() {
                tracing::warn!(provider = %outbound.provider, status, "upstream stream opened with error status");
            }
            let content_type = resp
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            return Ok(ProviderResponse::Stream(StreamingReply {
                status,
                content_type,
                body: Self::byte_stream(resp),
            }));
        }

        let json = policy
            .run(cancel, move || async move {
                let resp = self.send(self.request(outbound)).await?;
                let json: Value = resp.json().await?;
                Ok(json)
            })
            .await?;
        Ok(ProviderResponse::Complete(json))
    }

    /// Converts a `reqwest::Response` into a `ByteStream`.
    #[must_use]
    pub fn byte_stream(resp: Response) -> ByteStream {
        Box::pin(resp.bytes_stream().map(|r| r.map_err(RelayError::from)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptrelay_translate::ReplyShape;
    use promptrelay_types::ProviderId;
    use serde_json::json;

    fn outbound(body: Option<Value>) -> OutboundRequest {
        OutboundRequest {
            provider: ProviderId::OpenAi,
            url: "http://127.0.0.1:9/v1/models".into(),
            headers: vec![("authorization".into(), "Bearer sk".into())],
            body,
            stream: false,
            reply: ReplyShape::OpenAi,
            include_thoughts: false,
        }
    }

    #[test]
    fn test_provider_http_clone() {
        let http = ProviderHttp::new(Client::new());
        let _http2 = http.clone();
    }

    #[test]
    fn test_with_proxy() {
        assert!(ProviderHttp::with_proxy(None).is_ok());
        assert!(ProviderHttp::with_proxy(Some("")).is_ok());
        assert!(ProviderHttp::with_proxy(Some("http://127.0.0.1:3128")).is_ok());
    }

    #[test]
    fn test_request_method_and_headers() {
        let http = ProviderHttp::new(Client::new());

        let get = http.request(&outbound(None)).build().unwrap();
        assert_eq!(get.method(), reqwest::Method::GET);
        assert_eq!(get.headers()["authorization"], "Bearer sk");

        let post = http
            .request(&outbound(Some(json!({"model": "m"}))))
            .build()
            .unwrap();
        assert_eq!(post.method(), reqwest::Method::POST);
        assert_eq!(post.headers()[CONTENT_TYPE], "application/json");
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let http = ProviderHttp::new(Client::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = http
            .execute(&outbound(None), &RetryPolicy::default(), &cancel)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RelayError::Cancelled));
    }
}

//! Traits and stream types shared across all promptrelay crates.
//!
//! Every cross-crate abstraction is defined here so that higher layers depend
//! only on `promptrelay-types`, not on each other.

use crate::error::Result;
use bytes::Bytes;
use futures_core::Stream;
use serde_json::Value;
use std::{collections::HashMap, pin::Pin};

/// A pinned, sendable stream of upstream body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Upstream streaming reply, relayed to the caller byte for byte.
pub struct StreamingReply {
    /// HTTP status returned by the upstream.
    pub status: u16,
    /// Upstream `content-type`, if any.
    pub content_type: Option<String>,
    /// The raw body.
    pub body: ByteStream,
}

/// The result of one provider call.
pub enum ProviderResponse {
    /// A complete JSON response, as returned by the provider.
    Complete(Value),
    /// An unmodified upstream stream.
    Stream(StreamingReply),
}

/// Resolves per-user provider secrets by credential key.
///
/// Implementations must not block; lookups happen on the request path.
pub trait CredentialSource: Send + Sync {
    /// Returns the secret stored under `key` (e.g. `"api_key_claude"`).
    fn credential(&self, key: &str) -> Option<String>;
}

impl CredentialSource for HashMap<String, String> {
    fn credential(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.is_empty()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_credential_source() {
        let mut map = HashMap::new();
        map.insert("api_key_claude".to_string(), "sk-ant".to_string());
        map.insert("api_key_cohere".to_string(), String::new());
        assert_eq!(map.credential("api_key_claude").as_deref(), Some("sk-ant"));
        assert_eq!(map.credential("api_key_cohere"), None);
        assert_eq!(map.credential("api_key_mistralai"), None);
    }
}

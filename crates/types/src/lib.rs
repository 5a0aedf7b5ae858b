//! Core types and traits for the promptrelay workspace.
//!
//! This crate defines the shared abstractions used across all layers of the
//! gateway: the provider-agnostic message model, prompt names, provider
//! identifiers, the error type, and the credential lookup seam.

pub mod chat;
pub mod error;
pub mod message;
pub mod names;
pub mod provider;
pub mod traits;

pub use chat::{GenerateRequest, PromptInput};
pub use error::{RelayError, Result};
pub use message::{
    Content, ContentPart, DEFAULT_PLACEHOLDER, DataUri, FunctionCall, MediaUrl, Message, Role,
    ToolCall,
};
pub use names::PromptNames;
pub use provider::{ApiKind, ProviderId};
pub use traits::{ByteStream, CredentialSource, ProviderResponse, StreamingReply};

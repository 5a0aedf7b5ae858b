//! Prompt converters between the generic message model and provider formats.
//!
//! Every converter takes ownership of the message list and returns the
//! provider-shaped prompt; the input cannot be reused afterwards. All
//! functions here are pure with no I/O.

pub mod ai21;
pub mod cache_control;
pub mod claude;
pub mod cohere;
pub mod google;
pub mod merge;
pub mod mistral;
pub mod prefix;
pub mod reply;
pub mod text_completion;

pub use ai21::convert_ai21;
pub use cache_control::{CacheAnchor, CacheControl, cache_at_depth};
pub use claude::{ClaudeOptions, ClaudePrompt, convert_claude};
pub use cohere::{CoherePrompt, convert_cohere};
pub use google::{GoogleOptions, GooglePrompt, convert_google, is_vision_model};
pub use merge::{MergeOptions, PostProcessing, merge_messages};
pub use mistral::{MistralOptions, convert_mistral};
pub use prefix::apply_speaker_prefix;
pub use reply::{ReplyShape, normalize_reply};
pub use text_completion::{flatten_prompt, prompt_text};

//! Provider dispatch: the per-provider table, request assembly, and the
//! HTTP call with retry and cancellation.
//!
//! [`registry::spec`] describes every backend. A [`Dispatcher`] turns a
//! [`promptrelay_types::GenerateRequest`] into an [`OutboundRequest`], and
//! [`ProviderHttp::execute`] performs it.

pub mod allow_list;
pub mod cache;
pub mod dispatch;
pub mod http_util;
pub mod registry;
pub mod retry;

pub use cache::{Clock, ExpiringCache, SystemClock};
pub use dispatch::{Dispatcher, OutboundRequest};
pub use http_util::ProviderHttp;
pub use registry::{ProviderSpec, spec};
pub use retry::RetryPolicy;

//! Outbound service client.
//!
//! # Data Flow
//! ```text
//! Caller (registry lookup or direct construction)
//!     → service_client.rs (breaker gate, retry loop, timeout per attempt)
//!     → request.rs (headers, query, JSON body)
//!     → reqwest
//!     → response.rs (decode JSON / text / empty, extract error detail)
//! ```
//!
//! # Design Decisions
//! - One `ServiceClient` per destination; each owns its circuit breaker
//! - A fresh `x-request-id` per logical call, reused across its retries
//! - Transport errors are mapped into the crate error taxonomy, never leaked raw

pub mod request;
pub mod response;
pub mod service_client;

pub use request::{RequestOptions, X_REQUEST_ID};
pub use response::ResponseBody;
pub use service_client::{ClientSettings, ServiceClient};

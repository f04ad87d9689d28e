//! Inter-service communication layer for the LMS services.
//!
//! A registry of named destinations, an HTTP client with bounded retries and
//! a per-destination circuit breaker, and an in-process event dispatcher with
//! optional HTTP fan-out to peers.

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod inbox;
pub mod lifecycle;
pub mod messaging;
pub mod observability;
pub mod registry;
pub mod resilience;

pub use client::{ClientSettings, RequestOptions, ResponseBody, ServiceClient};
pub use config::InterconnectConfig;
pub use context::ServiceContext;
pub use error::{InterconnectError, Result, UnavailableReason};
pub use events::{handler_fn, Event, EventClient, EventDispatcher, EventHandler, EventType};
pub use lifecycle::Shutdown;
pub use messaging::{LiveMessaging, Messaging, NoopMessaging};
pub use registry::{PeerClient, ServiceRegistry};
pub use resilience::{Admission, CircuitBreaker, CircuitState};

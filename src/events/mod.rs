//! Event subsystem.
//!
//! # Data Flow
//! ```text
//! Producer (request handler, Messaging port)
//!     → dispatcher.rs (record in history.rs, run local handlers in order)
//!     → remote.rs (optional: POST the wire form to peers via the registry)
//!
//! Peer side:
//!     inbox (POST /api/v1/events) → types.rs (decode) → dispatcher.rs
//! ```
//!
//! # Design Decisions
//! - In-process observer, not a broker: no persistence, no delivery guarantee
//! - Handler failures never reach the publisher
//! - History is a fixed-capacity ring; oldest events are evicted first

pub mod dispatcher;
pub mod history;
pub mod remote;
pub mod types;

pub use dispatcher::{handler_fn, EventDispatcher, EventHandler, HandlerError};
pub use history::EventHistory;
pub use remote::{Delivery, EventClient};
pub use types::{Event, EventType};

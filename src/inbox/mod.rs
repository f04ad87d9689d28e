//! Event inbox subsystem.
//!
//! # Data Flow
//! ```text
//! Peer EventClient
//!     → POST {ingest_path} (server.rs, axum)
//!     → Event (serde wire form)
//!     → local EventDispatcher (history + handlers)
//!     → 201 {"message", "event_id"}
//! ```

pub mod server;

pub use server::{router, InboxServer, HEALTH_PATH};

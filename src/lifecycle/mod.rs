//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Init logging → Build ServiceContext → Start inbox
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C or explicit trigger → Stop accepting → Drain in-flight requests → Exit
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)
//! - Teardown is explicit; nothing lives in process-wide statics

pub mod shutdown;

pub use shutdown::Shutdown;

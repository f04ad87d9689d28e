//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a destination:
//!     → circuit_breaker.rs (admit, probe, or fail fast)
//!     → attempt (bounded by the client timeout)
//!     → On failure: retries.rs (classify, back off via backoff.rs, retry)
//!     → circuit_breaker.rs (record the call's final outcome)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - One breaker report per logical call, not per attempt
//! - Circuit breaker prevents cascading failures

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;

pub use circuit_breaker::{Admission, BreakerSettings, CircuitBreaker, CircuitSnapshot, CircuitState};
pub use retries::{FailurePolicy, RetryPolicy};

//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → InterconnectConfig (validated, immutable)
//!     → ServiceContext builds registry, dispatcher and messaging from it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, with_service_name, ConfigError};
pub use schema::CircuitBreakerConfig;
pub use schema::ClientConfig;
pub use schema::EventsConfig;
pub use schema::InboxConfig;
pub use schema::InterconnectConfig;
pub use schema::ObservabilityConfig;
pub use schema::ServiceEndpointConfig;
pub use schema::ServiceIdentity;

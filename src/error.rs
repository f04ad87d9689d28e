//! Error taxonomy for inter-service communication.

use std::fmt;

use thiserror::Error;

use crate::config::loader::ConfigError;

/// Why a destination was considered unavailable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    /// The circuit breaker refused the call; no request was sent.
    CircuitOpen,
    /// Every attempt failed with a retryable error.
    RetriesExhausted {
        attempts: u32,
        /// Status of the last attempt, `None` when it never got a response.
        last_status: Option<u16>,
    },
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CircuitOpen => write!(f, "circuit open"),
            Self::RetriesExhausted { attempts, last_status: Some(status) } => {
                write!(f, "returned {status} after {attempts} attempts")
            }
            Self::RetriesExhausted { attempts, last_status: None } => {
                write!(f, "unreachable after {attempts} attempts")
            }
        }
    }
}

/// Errors surfaced by the registry, service clients and event propagation.
#[derive(Debug, Error)]
pub enum InterconnectError {
    /// Lookup of a service name that was never registered.
    #[error("service '{service}' not registered")]
    NotRegistered { service: String },

    /// Destination down, retries exhausted, or circuit open.
    #[error("service '{service}' is unavailable: {reason}")]
    ServiceUnavailable {
        service: String,
        reason: UnavailableReason,
    },

    /// The destination rejected the request with a 4xx status.
    #[error("service '{service}' rejected request with status {status}: {detail}")]
    Rejected {
        service: String,
        status: u16,
        detail: String,
    },

    /// Any other transport or decoding failure.
    #[error("communication with service '{service}' failed: {message}")]
    Communication { service: String, message: String },

    /// A base URL or path that does not form a valid URL.
    #[error("invalid url '{url}' for service '{service}': {message}")]
    InvalidUrl {
        service: String,
        url: String,
        message: String,
    },

    /// A configured default header that is not a valid HTTP header.
    #[error("invalid header '{name}' for service '{service}': {message}")]
    InvalidHeader {
        service: String,
        name: String,
        message: String,
    },

    /// A service tried to call itself through the peer client.
    #[error("service '{service}' cannot call itself")]
    SelfCall { service: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl InterconnectError {
    pub(crate) fn unavailable(service: &str, reason: UnavailableReason) -> Self {
        Self::ServiceUnavailable {
            service: service.to_string(),
            reason,
        }
    }

    pub(crate) fn communication(service: &str, message: impl Into<String>) -> Self {
        Self::Communication {
            service: service.to_string(),
            message: message.into(),
        }
    }

    /// True for errors a caller may retry at a higher level.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable { .. })
    }

    /// Status code of a rejected request.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for inter-service operations.
pub type Result<T> = std::result::Result<T, InterconnectError>;

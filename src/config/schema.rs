//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a service's
//! communication layer. All types derive Serde traits for deserialization
//! from config files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the inter-service communication layer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InterconnectConfig {
    /// Identity of the local service.
    pub service: ServiceIdentity,

    /// Outbound HTTP client settings shared by every destination.
    pub client: ClientConfig,

    /// Circuit breaker settings applied per destination.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Local event dispatch settings.
    pub events: EventsConfig,

    /// Event inbox listener.
    pub inbox: InboxConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Destinations to register at startup.
    pub services: Vec<ServiceEndpointConfig>,
}

impl Default for InterconnectConfig {
    fn default() -> Self {
        Self {
            service: ServiceIdentity::default(),
            client: ClientConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            events: EventsConfig::default(),
            inbox: InboxConfig::default(),
            observability: ObservabilityConfig::default(),
            services: default_services(),
        }
    }
}

/// Development registrations for the LMS services.
fn default_services() -> Vec<ServiceEndpointConfig> {
    [
        ("user", "http://localhost:8006"),
        ("course", "http://localhost:8000"),
        ("enrollment", "http://localhost:8002"),
        ("assessment", "http://localhost:8003"),
        ("progress", "http://localhost:8004"),
        ("communication", "http://localhost:8005"),
        ("content", "http://localhost:8007"),
        ("analytics", "http://localhost:8008"),
    ]
    .into_iter()
    .map(|(name, url)| ServiceEndpointConfig::new(name, url))
    .collect()
}

/// Local service identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceIdentity {
    /// Logical name, stamped on every published event.
    pub name: String,
}

impl Default for ServiceIdentity {
    fn default() -> Self {
        Self {
            name: "gateway".to_string(),
        }
    }
}

/// Outbound HTTP client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Total timeout for one attempt, in seconds.
    pub timeout_secs: u64,

    /// Retries after the first attempt.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Upper bound for a single backoff delay in milliseconds.
    pub max_delay_ms: u64,

    /// Proportional jitter added to each delay (0.0 disables it).
    pub jitter_ratio: f64,

    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter_ratio: 0.0,
            user_agent: "LMS-Service-Client/1.0".to_string(),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures in the closed state before opening the circuit.
    pub failure_threshold: u32,

    /// How long the circuit stays open before a probe is allowed, in seconds.
    pub recovery_timeout_secs: u64,

    /// Whether 4xx responses count as breaker failures.
    pub trip_on_client_errors: bool,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_secs: 60,
            trip_on_client_errors: true,
        }
    }
}

/// Event dispatch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Events kept in the dispatcher history.
    pub history_capacity: usize,

    /// Path on peer services that ingests forwarded events.
    pub ingest_path: String,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            history_capacity: 1000,
            ingest_path: "/api/v1/events".to_string(),
        }
    }
}

/// Event inbox listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InboxConfig {
    /// Bind address (e.g., "0.0.0.0:8010").
    pub bind_address: String,
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8010".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "pretty" or "json".
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

/// A destination service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceEndpointConfig {
    /// Logical service name (e.g., "enrollment").
    pub name: String,

    /// Base URL every request path is appended to.
    pub base_url: String,

    /// Per-destination override of `client.timeout_secs`.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Headers sent with every request to this destination.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl ServiceEndpointConfig {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            timeout_secs: None,
            headers: BTreeMap::new(),
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl CircuitBreakerConfig {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_client_contract() {
        let config = InterconnectConfig::default();
        assert_eq!(config.client.max_retries, 3);
        assert_eq!(config.client.base_delay(), Duration::from_secs(1));
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.recovery_timeout(), Duration::from_secs(60));
        assert_eq!(config.events.history_capacity, 1000);
        assert_eq!(config.services.len(), 8);
    }

    #[test]
    fn test_minimal_toml() {
        let config: InterconnectConfig = toml::from_str(
            r#"
            [service]
            name = "enrollment"

            [[services]]
            name = "user"
            base_url = "http://user:8000"
            headers = { "X-Service-Token" = "secret" }
            "#,
        )
        .unwrap();

        assert_eq!(config.service.name, "enrollment");
        assert_eq!(config.services.len(), 1);
        assert_eq!(config.services[0].headers["X-Service-Token"], "secret");
        assert_eq!(config.client.timeout_secs, 30);
    }
}

//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, thresholds >= 1)
//! - Detect duplicate or malformed service registrations
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: InterconnectConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;

use reqwest::header::{HeaderName, HeaderValue};
use url::Url;

use crate::config::schema::InterconnectConfig;
use crate::inbox::HEALTH_PATH;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &InterconnectConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.service.name.trim().is_empty() {
        errors.push(ValidationError::new("service.name", "must not be empty"));
    }

    let client = &config.client;
    if client.timeout_secs == 0 {
        errors.push(ValidationError::new("client.timeout_secs", "must be at least 1"));
    }
    if client.max_delay_ms < client.base_delay_ms {
        errors.push(ValidationError::new(
            "client.max_delay_ms",
            "must not be smaller than client.base_delay_ms",
        ));
    }
    if !(0.0..=1.0).contains(&client.jitter_ratio) {
        errors.push(ValidationError::new(
            "client.jitter_ratio",
            "must be between 0.0 and 1.0",
        ));
    }

    let breaker = &config.circuit_breaker;
    if breaker.failure_threshold == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.failure_threshold",
            "must be at least 1",
        ));
    }
    if breaker.recovery_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.recovery_timeout_secs",
            "must be at least 1",
        ));
    }

    if config.events.history_capacity == 0 {
        errors.push(ValidationError::new("events.history_capacity", "must be at least 1"));
    }
    let ingest_path = config.events.ingest_path.as_str();
    if !ingest_path.starts_with('/') {
        errors.push(ValidationError::new("events.ingest_path", "must start with '/'"));
    } else if ingest_path == HEALTH_PATH {
        errors.push(ValidationError::new(
            "events.ingest_path",
            format!("collides with the health route {HEALTH_PATH}"),
        ));
    } else if ingest_path.contains([':', '*', '{', '}']) {
        errors.push(ValidationError::new(
            "events.ingest_path",
            "must be a literal path without ':', '*', '{' or '}'",
        ));
    }

    match config.observability.log_format.as_str() {
        "pretty" | "json" => {}
        other => errors.push(ValidationError::new(
            "observability.log_format",
            format!("unknown format '{other}', expected 'pretty' or 'json'"),
        )),
    }

    let mut seen = HashSet::new();
    for (i, service) in config.services.iter().enumerate() {
        let field = format!("services[{i}]");
        if service.name.trim().is_empty() {
            errors.push(ValidationError::new(format!("{field}.name"), "must not be empty"));
        } else if !seen.insert(service.name.as_str()) {
            errors.push(ValidationError::new(
                format!("{field}.name"),
                format!("duplicate service '{}'", service.name),
            ));
        }

        match Url::parse(&service.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(ValidationError::new(
                format!("{field}.base_url"),
                format!("unsupported scheme '{}'", url.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new(
                format!("{field}.base_url"),
                format!("invalid url '{}': {e}", service.base_url),
            )),
        }

        for (name, value) in &service.headers {
            if HeaderName::from_bytes(name.as_bytes()).is_err() {
                errors.push(ValidationError::new(
                    format!("{field}.headers"),
                    format!("invalid header name '{name}'"),
                ));
            } else if HeaderValue::from_str(value).is_err() {
                errors.push(ValidationError::new(
                    format!("{field}.headers"),
                    format!("invalid value for header '{name}'"),
                ));
            }
        }

        if service.timeout_secs == Some(0) {
            errors.push(ValidationError::new(
                format!("{field}.timeout_secs"),
                "must be at least 1",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

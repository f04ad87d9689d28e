//! Service registry.
//!
//! # Responsibilities
//! - Map a logical service name to its `ServiceClient`
//! - Build clients from configuration with shared settings
//! - Hand out peer clients bound to the local service identity
//!
//! # Design Decisions
//! - Lookups never auto-create; an unknown name is `NotRegistered`
//! - Re-registration replaces the client (and with it the breaker state)
//! - The registry holds no retry or circuit state of its own

pub mod peers;

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::client::{ClientSettings, ServiceClient};
use crate::config::{InterconnectConfig, ServiceEndpointConfig};
use crate::error::{InterconnectError, Result};

pub use peers::PeerClient;

/// Name → client directory shared by everything in one process.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    inner: Arc<DashMap<String, Arc<ServiceClient>>>,
    settings: ClientSettings,
}

impl ServiceRegistry {
    /// Empty registry whose clients are built with `settings`.
    pub fn new(settings: ClientSettings) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            settings,
        }
    }

    /// Registry holding every destination listed in the configuration.
    pub fn from_config(config: &InterconnectConfig) -> Result<Self> {
        let registry = Self::new(ClientSettings::from_config(&config.client, &config.circuit_breaker));
        for endpoint in &config.services {
            registry.register_endpoint(endpoint)?;
        }
        tracing::info!(services = registry.inner.len(), "Service registry ready");
        Ok(registry)
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Register `name` at `base_url`, replacing any previous registration.
    pub fn register(&self, name: &str, base_url: &str) -> Result<Arc<ServiceClient>> {
        self.register_with_headers(name, base_url, HeaderMap::new())
    }

    /// Register with default headers sent on every call to this destination.
    pub fn register_with_headers(
        &self,
        name: &str,
        base_url: &str,
        headers: HeaderMap,
    ) -> Result<Arc<ServiceClient>> {
        let client = ServiceClient::new(name, base_url, self.settings.clone())?.with_default_headers(headers);
        Ok(self.insert(client))
    }

    /// Register a destination described by configuration.
    pub fn register_endpoint(&self, endpoint: &ServiceEndpointConfig) -> Result<Arc<ServiceClient>> {
        let mut settings = self.settings.clone();
        if let Some(secs) = endpoint.timeout_secs {
            settings.timeout = Duration::from_secs(secs);
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &endpoint.headers {
            let invalid = |message: String| InterconnectError::InvalidHeader {
                service: endpoint.name.clone(),
                name: name.clone(),
                message,
            };
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
            let header_value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
            headers.insert(header_name, header_value);
        }

        let client = ServiceClient::new(endpoint.name.as_str(), &endpoint.base_url, settings)?
            .with_default_headers(headers);
        Ok(self.insert(client))
    }

    fn insert(&self, client: ServiceClient) -> Arc<ServiceClient> {
        let client = Arc::new(client);
        let previous = self.inner.insert(client.name().to_string(), Arc::clone(&client));
        match previous {
            Some(old) => tracing::info!(
                service = %client.name(),
                old_url = %old.base_url(),
                new_url = %client.base_url(),
                "Service re-registered"
            ),
            None => tracing::debug!(service = %client.name(), url = %client.base_url(), "Service registered"),
        }
        client
    }

    /// Client for `name`.
    ///
    /// # Errors
    ///
    /// `NotRegistered` if the name was never registered.
    pub fn get_client(&self, name: &str) -> Result<Arc<ServiceClient>> {
        self.inner
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| InterconnectError::NotRegistered {
                service: name.to_string(),
            })
    }

    /// Base URL registered for `name`.
    pub fn get_url(&self, name: &str) -> Result<String> {
        self.get_client(name).map(|client| client.base_url().to_string())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// Every registered client, sorted by name.
    pub fn clients(&self) -> Vec<Arc<ServiceClient>> {
        let mut clients: Vec<_> = self.inner.iter().map(|entry| Arc::clone(entry.value())).collect();
        clients.sort_by(|a, b| a.name().cmp(b.name()));
        clients
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drop every registration.
    pub fn clear(&self) {
        self.inner.clear();
    }

    /// Peer client acting on behalf of `local_service`.
    pub fn peers(&self, local_service: impl Into<String>) -> PeerClient {
        PeerClient::new(local_service, self.clone())
    }
}

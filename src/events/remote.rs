//! Forwarding events to peer services over HTTP.

use futures_util::future::join_all;

use crate::error::{InterconnectError, Result};
use crate::events::types::Event;
use crate::registry::ServiceRegistry;

/// Default ingestion path on peer services.
pub const DEFAULT_INGEST_PATH: &str = "/api/v1/events";

/// Outcome of one delivery in a broadcast.
#[derive(Debug)]
pub struct Delivery {
    pub target: String,
    pub result: Result<()>,
}

impl Delivery {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// POSTs serialized events to peers' ingestion endpoints.
///
/// Deliveries go through the registry's clients and so inherit their
/// retry and circuit breaker behavior.
#[derive(Debug, Clone)]
pub struct EventClient {
    service: String,
    registry: ServiceRegistry,
    ingest_path: String,
}

impl EventClient {
    pub fn new(service: impl Into<String>, registry: ServiceRegistry) -> Self {
        Self {
            service: service.into(),
            registry,
            ingest_path: DEFAULT_INGEST_PATH.to_string(),
        }
    }

    pub fn with_ingest_path(mut self, path: impl Into<String>) -> Self {
        self.ingest_path = path.into();
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn ingest_path(&self) -> &str {
        &self.ingest_path
    }

    /// Deliver `event` to one peer.
    pub async fn send_event_to_service(&self, target: &str, event: &Event) -> Result<()> {
        let client = self.registry.get_client(target)?;
        let body = serde_json::to_value(event)
            .map_err(|e| InterconnectError::communication(target, format!("failed to encode event: {e}")))?;

        match client.post(&self.ingest_path, body).await {
            Ok(_) => {
                tracing::debug!(target_service = %target, event_id = %event.event_id(), "Event delivered");
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    target_service = %target,
                    event_id = %event.event_id(),
                    error = %e,
                    "Failed to send event"
                );
                Err(e)
            }
        }
    }

    /// Deliver `event` to every target except the local service, concurrently.
    pub async fn broadcast_event(&self, event: &Event, targets: &[String]) -> Vec<Delivery> {
        let sends = targets
            .iter()
            .filter(|target| **target != self.service)
            .map(|target| async move {
                Delivery {
                    target: target.clone(),
                    result: self.send_event_to_service(target, event).await,
                }
            });
        let deliveries = join_all(sends).await;

        let failed = deliveries.iter().filter(|d| !d.is_ok()).count();
        tracing::info!(
            event_id = %event.event_id(),
            event_type = %event.event_type(),
            delivered = deliveries.len() - failed,
            failed,
            "Broadcast finished"
        );
        deliveries
    }

    /// Broadcast to every registered service.
    pub async fn broadcast_to_all(&self, event: &Event) -> Vec<Delivery> {
        let targets = self.registry.service_names();
        self.broadcast_event(event, &targets).await
    }
}

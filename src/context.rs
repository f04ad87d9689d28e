//! Composition root for one service process.
//!
//! # Responsibilities
//! - Own the single registry and the service's dispatcher
//! - Pick the messaging implementation once, at construction
//! - Tear everything down explicitly so tests never share state

use std::sync::Arc;

use crate::config::{EventsConfig, InterconnectConfig};
use crate::error::Result;
use crate::events::{EventClient, EventDispatcher};
use crate::messaging::{LiveMessaging, Messaging, NoopMessaging};
use crate::registry::{PeerClient, ServiceRegistry};

/// Everything a service needs to talk to its peers.
#[derive(Clone)]
pub struct ServiceContext {
    service: String,
    registry: ServiceRegistry,
    dispatcher: EventDispatcher,
    events: EventClient,
    messaging: Arc<dyn Messaging>,
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("service", &self.service)
            .field("services", &self.registry.service_names())
            .finish()
    }
}

impl ServiceContext {
    /// Live context built from a validated configuration.
    pub fn from_config(config: &InterconnectConfig) -> Result<Self> {
        let service = config.service.name.clone();
        let registry = ServiceRegistry::from_config(config)?;
        let dispatcher = EventDispatcher::new(service.clone(), config.events.history_capacity);
        let events = EventClient::new(service.clone(), registry.clone())
            .with_ingest_path(config.events.ingest_path.clone());
        let messaging = Arc::new(LiveMessaging::new(dispatcher.clone(), events.clone()));

        tracing::info!(service = %service, peers = registry.len(), "Service context ready");
        Ok(Self {
            service,
            registry,
            dispatcher,
            events,
            messaging,
        })
    }

    /// Context with an empty registry and no-op messaging.
    pub fn detached(service: impl Into<String>) -> Self {
        let service = service.into();
        let registry = ServiceRegistry::default();
        Self {
            dispatcher: EventDispatcher::new(service.clone(), EventsConfig::default().history_capacity),
            events: EventClient::new(service.clone(), registry.clone()),
            messaging: Arc::new(NoopMessaging::new(service.clone())),
            registry,
            service,
        }
    }

    /// Replace the messaging implementation.
    pub fn with_messaging(mut self, messaging: Arc<dyn Messaging>) -> Self {
        self.messaging = messaging;
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn events(&self) -> &EventClient {
        &self.events
    }

    pub fn messaging(&self) -> Arc<dyn Messaging> {
        Arc::clone(&self.messaging)
    }

    pub fn peers(&self) -> PeerClient {
        self.registry.peers(self.service.clone())
    }

    /// Drop registrations, subscribers and history.
    pub fn teardown(&self) {
        self.dispatcher.clear();
        self.registry.clear();
        tracing::info!(service = %self.service, "Service context torn down");
    }
}

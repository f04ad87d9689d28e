//! Messaging port used by service code to emit domain events.
//!
//! Chosen once at composition time: [`LiveMessaging`] publishes on the local
//! dispatcher and forwards to peers, [`NoopMessaging`] only builds and logs
//! the event.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::events::{Event, EventClient, EventDispatcher, EventType};

#[async_trait]
pub trait Messaging: Send + Sync {
    /// Name of the service events are published from.
    fn service(&self) -> &str;

    /// Publish a new event of `event_type` carrying `data`.
    async fn publish(&self, event_type: EventType, data: Value) -> Event;

    /// Send an already published event to one peer.
    async fn forward(&self, target: &str, event: &Event) -> Result<()>;

    async fn user_created(&self, data: Value) -> Event {
        self.publish(EventType::UserCreated, data).await
    }

    async fn user_updated(&self, data: Value) -> Event {
        self.publish(EventType::UserUpdated, data).await
    }

    async fn course_created(&self, data: Value) -> Event {
        self.publish(EventType::CourseCreated, data).await
    }

    async fn enrollment_created(&self, data: Value) -> Event {
        self.publish(EventType::EnrollmentCreated, data).await
    }

    async fn enrollment_completed(&self, data: Value) -> Event {
        self.publish(EventType::EnrollmentCompleted, data).await
    }

    async fn assessment_submitted(&self, data: Value) -> Event {
        self.publish(EventType::AssessmentSubmitted, data).await
    }

    async fn progress_updated(&self, data: Value) -> Event {
        self.publish(EventType::ProgressUpdated, data).await
    }

    async fn progress_completed(&self, data: Value) -> Event {
        self.publish(EventType::ProgressCompleted, data).await
    }

    async fn notification_created(&self, data: Value) -> Event {
        self.publish(EventType::NotificationCreated, data).await
    }
}

/// Publishes locally and forwards through the registry.
#[derive(Debug, Clone)]
pub struct LiveMessaging {
    dispatcher: EventDispatcher,
    events: EventClient,
}

impl LiveMessaging {
    pub fn new(dispatcher: EventDispatcher, events: EventClient) -> Self {
        Self { dispatcher, events }
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn events(&self) -> &EventClient {
        &self.events
    }
}

#[async_trait]
impl Messaging for LiveMessaging {
    fn service(&self) -> &str {
        self.dispatcher.service()
    }

    async fn publish(&self, event_type: EventType, data: Value) -> Event {
        self.dispatcher.publish_event(event_type, data, None).await
    }

    async fn forward(&self, target: &str, event: &Event) -> Result<()> {
        self.events.send_event_to_service(target, event).await
    }
}

/// Builds events without delivering them anywhere.
#[derive(Debug, Clone)]
pub struct NoopMessaging {
    service: String,
}

impl NoopMessaging {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

#[async_trait]
impl Messaging for NoopMessaging {
    fn service(&self) -> &str {
        &self.service
    }

    async fn publish(&self, event_type: EventType, data: Value) -> Event {
        let event = Event::new(event_type, data, self.service.clone());
        tracing::debug!(service = %self.service, %event_type, event_id = %event.event_id(), "Event dropped (noop messaging)");
        event
    }

    async fn forward(&self, target: &str, event: &Event) -> Result<()> {
        tracing::debug!(service = %self.service, target_service = %target, event_id = %event.event_id(), "Forward skipped (noop messaging)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ServiceRegistry;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_live_messaging_publishes_locally() {
        let dispatcher = EventDispatcher::new("enrollment", 10);
        let messaging = LiveMessaging::new(
            dispatcher.clone(),
            EventClient::new("enrollment", ServiceRegistry::default()),
        );

        let event = messaging.enrollment_created(json!({"enrollment_id": 3})).await;
        assert_eq!(event.event_type(), EventType::EnrollmentCreated);
        assert_eq!(dispatcher.history_of(EventType::EnrollmentCreated).len(), 1);
    }

    #[tokio::test]
    async fn test_noop_messaging() {
        let messaging: Arc<dyn Messaging> = Arc::new(NoopMessaging::new("user"));
        let event = messaging.user_created(json!({"id": 1})).await;
        assert_eq!(event.source_service(), "user");
        assert!(messaging.forward("course", &event).await.is_ok());
    }
}

//! In-process publish/subscribe.
//!
//! Handlers for one event type run sequentially in subscription order. A
//! handler that fails or panics is logged and counted; the remaining handlers
//! still run and the publisher never sees the failure.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use async_trait::async_trait;
use futures_util::FutureExt;
use serde_json::Value;

use crate::events::history::EventHistory;
use crate::events::types::{Event, EventType};
use crate::observability::metrics;

/// Error type returned by event handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Consumer of published events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event) -> Result<(), HandlerError>;
}

/// Handler built from an async closure.
pub struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Event) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        (self.f)(event.clone()).await
    }
}

/// Wrap an async closure as a shareable handler.
///
/// ```ignore
/// let handler = handler_fn(|event| async move {
///     tracing::info!(id = event.event_id(), "enrollment created");
///     Ok(())
/// });
/// dispatcher.subscribe(EventType::EnrollmentCreated, handler.clone());
/// ```
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn EventHandler>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(FnHandler { f })
}

type HandlerList = Vec<Arc<dyn EventHandler>>;

struct DispatcherInner {
    service: String,
    subscribers: RwLock<HashMap<EventType, HandlerList>>,
    history: Mutex<EventHistory>,
}

/// Event dispatcher owned by one logical service.
///
/// Cloning is cheap; clones share subscribers and history.
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<DispatcherInner>,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("service", &self.inner.service)
            .field("history_len", &self.history_len())
            .finish()
    }
}

fn same_handler(a: &Arc<dyn EventHandler>, b: &Arc<dyn EventHandler>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl EventDispatcher {
    pub fn new(service: impl Into<String>, history_capacity: usize) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                service: service.into(),
                subscribers: RwLock::new(HashMap::new()),
                history: Mutex::new(EventHistory::new(history_capacity)),
            }),
        }
    }

    /// Name stamped as `source_service` on events built by `publish_event`.
    pub fn service(&self) -> &str {
        &self.inner.service
    }

    fn history_lock(&self) -> MutexGuard<'_, EventHistory> {
        self.inner
            .history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append `handler` to the handlers of `event_type`.
    pub fn subscribe(&self, event_type: EventType, handler: Arc<dyn EventHandler>) {
        let mut subscribers = self
            .inner
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscribers.entry(event_type).or_default().push(handler);
        tracing::info!(service = %self.inner.service, %event_type, "Subscribed");
    }

    /// Remove the first subscription of this exact handler.
    ///
    /// Returns `false` when the handler was not subscribed to `event_type`.
    pub fn unsubscribe(&self, event_type: EventType, handler: &Arc<dyn EventHandler>) -> bool {
        let mut subscribers = self
            .inner
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(handlers) = subscribers.get_mut(&event_type) else {
            return false;
        };
        let Some(pos) = handlers.iter().position(|h| same_handler(h, handler)) else {
            return false;
        };
        handlers.remove(pos);
        if handlers.is_empty() {
            subscribers.remove(&event_type);
        }
        tracing::info!(service = %self.inner.service, %event_type, "Unsubscribed");
        true
    }

    pub fn subscriber_count(&self, event_type: EventType) -> usize {
        self.inner
            .subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&event_type)
            .map_or(0, Vec::len)
    }

    /// Record `event` in history and run every handler subscribed to its type.
    pub async fn publish(&self, event: &Event) {
        let event_type = event.event_type();
        let history_len = {
            let mut history = self.history_lock();
            history.push(event.clone());
            history.len()
        };
        metrics::record_history_size(&self.inner.service, history_len);

        let handlers: HandlerList = self
            .inner
            .subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&event_type)
            .cloned()
            .unwrap_or_default();

        for (index, handler) in handlers.iter().enumerate() {
            let outcome = AssertUnwindSafe(handler.handle(event)).catch_unwind().await;
            let failure = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };
            metrics::record_handler_failure(&self.inner.service, event_type.as_str());
            tracing::error!(
                service = %self.inner.service,
                %event_type,
                event_id = %event.event_id(),
                handler = index,
                error = %failure,
                "Event handler failed"
            );
        }

        metrics::record_event_published(&self.inner.service, event_type.as_str());
        tracing::info!(
            service = %self.inner.service,
            %event_type,
            event_id = %event.event_id(),
            handlers = handlers.len(),
            "Published event"
        );
    }

    /// Build an event from this service and publish it.
    pub async fn publish_event(&self, event_type: EventType, data: Value, event_id: Option<String>) -> Event {
        let mut event = Event::new(event_type, data, self.inner.service.clone());
        if let Some(id) = event_id {
            event = event.with_id(id);
        }
        self.publish(&event).await;
        event
    }

    /// Copy of the retained history, oldest first.
    pub fn history(&self) -> Vec<Event> {
        self.history_lock().snapshot()
    }

    pub fn history_of(&self, event_type: EventType) -> Vec<Event> {
        self.history_lock().of_type(event_type)
    }

    pub fn history_len(&self) -> usize {
        self.history_lock().len()
    }

    pub fn history_capacity(&self) -> usize {
        self.history_lock().capacity()
    }

    /// Drop all subscribers and history.
    pub fn clear(&self) {
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
        self.history_lock().clear();
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

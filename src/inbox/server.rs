//! HTTP server that ingests events forwarded by peer services.
//!
//! # Responsibilities
//! - Accept the event wire form on the ingest path and republish locally
//! - Expose the dispatcher's history for inspection
//! - Answer a trivial health check
//!
//! # Design Decisions
//! - Malformed payloads are rejected by axum's extractors (400/422)
//! - The received event keeps its original id, source and timestamp

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::events::{Event, EventDispatcher, EventType};
use crate::lifecycle::Shutdown;

/// Route answering the health check.
pub const HEALTH_PATH: &str = "/api/v1/health";

/// State injected into inbox handlers.
#[derive(Clone)]
pub struct InboxState {
    pub dispatcher: EventDispatcher,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventReceived {
    pub message: String,
    pub event_id: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub event_type: Option<EventType>,
}

/// Event inbox for one service.
pub struct InboxServer {
    router: Router,
}

impl InboxServer {
    pub fn new(dispatcher: EventDispatcher, ingest_path: &str) -> Self {
        Self {
            router: router(dispatcher, ingest_path),
        }
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Event inbox listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown.signalled())
            .await?;

        tracing::info!("Event inbox stopped");
        Ok(())
    }
}

/// Router with the ingest, history and health routes.
pub fn router(dispatcher: EventDispatcher, ingest_path: &str) -> Router {
    Router::new()
        .route(ingest_path, get(list_events).post(receive_event))
        .route(HEALTH_PATH, get(health))
        .with_state(InboxState { dispatcher })
        .layer(TraceLayer::new_for_http())
}

async fn receive_event(State(state): State<InboxState>, Json(event): Json<Event>) -> impl IntoResponse {
    tracing::info!(
        event_id = %event.event_id(),
        event_type = %event.event_type(),
        source_service = %event.source_service(),
        "Event received"
    );
    state.dispatcher.publish(&event).await;

    (
        StatusCode::CREATED,
        Json(EventReceived {
            message: "Event received successfully".to_string(),
            event_id: event.event_id().to_string(),
        }),
    )
}

async fn list_events(State(state): State<InboxState>, Query(query): Query<HistoryQuery>) -> Json<Vec<Event>> {
    let events = match query.event_type {
        Some(event_type) => state.dispatcher.history_of(event_type),
        None => state.dispatcher.history(),
    };
    Json(events)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

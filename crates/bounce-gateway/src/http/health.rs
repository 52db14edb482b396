use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness probe with server metadata.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let mut handlers = state.dispatcher.registered_handler_events();
    let mut senders = state.dispatcher.registered_sender_events();
    let mut periodic = state.scheduler.live_events();
    handlers.sort();
    senders.sort();
    periodic.sort();

    Json(json!({
        "status": "ok",
        "name": state.config.gateway.name,
        "version": env!("CARGO_PKG_VERSION"),
        "connections": state.dispatcher.connection_count(),
        "handlers": handlers,
        "senders": senders,
        "periodic": periodic,
    }))
}

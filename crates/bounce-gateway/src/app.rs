use axum::{routing::get, Router};
use bounce_core::BounceConfig;
use bounce_router::{BroadcastScheduler, Dispatcher};
use std::sync::Arc;

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: BounceConfig,
    pub dispatcher: Arc<Dispatcher>,
    /// Periodic broadcast tasks, started in `Gateway::serve` and drained on shutdown.
    pub scheduler: BroadcastScheduler,
}

impl AppState {
    pub fn new(config: BounceConfig, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            config,
            dispatcher,
            scheduler: BroadcastScheduler::new(),
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let route = state.config.gateway.route.trim();
    let ws_route = if route.starts_with('/') {
        route.to_string()
    } else {
        format!("/{route}")
    };
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route(&ws_route, get(crate::ws::connection::ws_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

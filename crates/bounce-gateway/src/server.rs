use bounce_core::{BounceConfig, Result};
use bounce_router::Dispatcher;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::app::{build_router, AppState};

/// A configured server: shared state plus the lifecycle around `axum::serve`.
pub struct Gateway {
    state: Arc<AppState>,
}

impl Gateway {
    pub fn new(config: BounceConfig, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            state: Arc::new(AppState::new(config, dispatcher)),
        }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Bind the configured `bind:port`.
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.state.config.listen_addr();
        Ok(TcpListener::bind(&addr).await?)
    }

    /// Start every periodic sender, serve until `shutdown` resolves, then
    /// drain the periodic tasks within the configured grace.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let state = self.state;
        let periodic = state.scheduler.start_all(state.dispatcher.sender_registry());
        let addr = listener.local_addr()?;
        info!(
            name = %state.config.gateway.name,
            %addr,
            route = %state.config.gateway.route,
            periodic,
            "gateway listening"
        );

        let router = build_router(Arc::clone(&state));
        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await;

        state.scheduler.shutdown(state.config.shutdown_grace()).await;
        info!(name = %state.config.gateway.name, "gateway stopped");
        Ok(served?)
    }
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C; shutting down");
        return;
    }
    info!("shutdown requested");
}

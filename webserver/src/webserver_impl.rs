//! Main webserver implementation
//!
//! Builds the router over the shared state and serves it until the shutdown
//! token fires, closing executions and subscribers before draining.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use shared::logging::{self, Component};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{WebServerError, WebServerResult};
use crate::state::AppState;
use crate::web::handlers::api;

#[derive(Clone)]
pub struct WebServer {
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Build the Axum router with all routes
    pub fn build_router(&self) -> Router {
        Router::new()
            .route("/api/searches", axum::routing::post(api::start_search))
            .route("/api/searches/:id", get(api::get_search).delete(api::cancel_search))
            .route("/api/searches/:id/events", get(api::stream_events))
            .route("/api/metrics", get(api::metrics))
            .route("/api/errors", get(api::recent_errors))
            .route("/health", get(api::health_check))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(CorsLayer::permissive())
                    .into_inner(),
            )
            .with_state(Arc::clone(&self.state))
    }

    /// Bind `bind_address` and serve until `shutdown` is cancelled
    pub async fn run(&self, bind_address: SocketAddr, shutdown: CancellationToken) -> WebServerResult<()> {
        let listener = TcpListener::bind(bind_address)
            .await
            .map_err(|e| WebServerError::ServerStartup(format!("Failed to bind to {bind_address}: {e}")))?;

        info!("🌐 Web server listening on http://{}", bind_address);
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` is cancelled
    ///
    /// Event streams only end when their broadcaster connection goes away, so
    /// active executions are cancelled and every subscriber closed before the
    /// server waits for in-flight responses.
    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) -> WebServerResult<()> {
        let router = self.build_router();
        let state = Arc::clone(&self.state);
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                let cancelled = state.registry().shutdown().await;
                let closed = state.broadcaster.shutdown().await;
                info!(cancelled, closed, "Draining HTTP connections");
            })
            .await?;

        logging::log_success(Component::WebServer, "HTTP server stopped");
        Ok(())
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }
}

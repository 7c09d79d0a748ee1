//! Control, Health and Metrics HTTP Server
//!
//! One `axum` listener carries the subscription control API alongside the
//! probes and the Prometheus endpoint.
//!
//! # Endpoints
//!
//! - `POST /subscribe` - Add one symbol to the desired set
//! - `POST /unsubscribe` - Remove one or more symbols
//! - `GET /subscriptions` - Sorted desired set
//! - `GET /health` - JSON health status
//! - `GET /healthz` - Liveness probe (simple OK)
//! - `GET /readyz` - Readiness probe (ready while streaming)
//! - `GET /metrics` - Prometheus metrics in text format

mod control;
mod health;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::SubscriptionService;
use crate::domain::streaming::FeedState;

pub use control::{
    ApiError, Code, Codes, ErrorResponse, SubscribeRequest, SubscribeResponse, UnsubscribeRequest,
    UnsubscribeResponse,
};
pub use health::{HealthResponse, HealthStatus, SubscriptionStatus};

// =============================================================================
// Server State
// =============================================================================

/// Shared state for every route.
pub struct HttpServerState {
    version: String,
    started_at: Instant,
    subscriptions: SubscriptionService,
    feed_state: Arc<FeedState>,
}

impl HttpServerState {
    /// Create new server state.
    #[must_use]
    pub fn new(
        version: String,
        subscriptions: SubscriptionService,
        feed_state: Arc<FeedState>,
    ) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            subscriptions,
            feed_state,
        }
    }
}

/// Build the router with all endpoints.
#[must_use]
pub fn create_router(state: Arc<HttpServerState>) -> Router {
    Router::new()
        .route("/subscribe", post(control::subscribe_handler))
        .route("/unsubscribe", post(control::unsubscribe_handler))
        .route("/subscriptions", get(control::list_handler))
        .route("/health", get(health::health_handler))
        .route("/healthz", get(health::liveness_handler))
        .route("/readyz", get(health::readiness_handler))
        .route("/metrics", get(health::metrics_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Server
// =============================================================================

/// Control and health HTTP server.
pub struct HttpServer {
    port: u16,
    state: Arc<HttpServerState>,
    cancel: CancellationToken,
}

impl HttpServer {
    /// Create a new server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HttpServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HttpServerError` if binding fails or the server encounters a
    /// fatal error while running.
    pub async fn run(self) -> Result<(), HttpServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HttpServerError::BindFailed(self.port, e.to_string()))?;

        self.serve(listener).await
    }

    /// Serve on an already bound listener until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HttpServerError::ServerFailed` on a fatal server error.
    pub async fn serve(self, listener: TcpListener) -> Result<(), HttpServerError> {
        let app = create_router(self.state);

        tracing::info!(
            addr = ?listener.local_addr().ok(),
            "HTTP server listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HttpServerError::ServerFailed(e.to_string()))?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

// =============================================================================
// Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

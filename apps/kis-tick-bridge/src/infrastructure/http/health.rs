//! Health, readiness and metrics routes.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::HttpServerState;
use crate::domain::streaming::{ConnectionState, FeedSnapshot};
use crate::infrastructure::metrics::get_metrics_handle;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Bridge version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Upstream feed status.
    pub feed: FeedSnapshot,
    /// Subscription statistics.
    pub subscriptions: SubscriptionStatus,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Streaming.
    Healthy,
    /// Connecting, resubscribing or backing off.
    Degraded,
    /// Loop not running.
    Unhealthy,
}

impl From<ConnectionState> for HealthStatus {
    fn from(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Streaming => Self::Healthy,
            ConnectionState::Connecting
            | ConnectionState::SubscribingInitial
            | ConnectionState::Backoff => Self::Degraded,
            ConnectionState::Disconnected => Self::Unhealthy,
        }
    }
}

/// Subscription statistics.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionStatus {
    /// Symbols callers want.
    pub desired: usize,
    /// Symbols subscribed on the current connection.
    pub remote: usize,
    /// Configured maximum.
    pub capacity: usize,
}

pub(super) async fn health_handler(State(state): State<Arc<HttpServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

pub(super) async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub(super) async fn readiness_handler(
    State(state): State<Arc<HttpServerState>>,
) -> impl IntoResponse {
    if state.feed_state.is_streaming() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

pub(super) async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_health_response(state: &HttpServerState) -> HealthResponse {
    let feed = state.feed_state.snapshot();

    HealthResponse {
        status: feed.state.into(),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        subscriptions: SubscriptionStatus {
            desired: state.subscriptions.count(),
            remote: feed.remote_subscriptions,
            capacity: state.subscriptions.capacity(),
        },
        feed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::SubscriptionService;
    use crate::domain::streaming::FeedState;
    use crate::domain::subscription::{SubscriptionRegistry, intent};
    use crate::infrastructure::http::create_router;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> (axum::Router, Arc<FeedState>, SubscriptionService) {
        let (tx, _rx) = intent::channel(16);
        let service = SubscriptionService::new(Arc::new(SubscriptionRegistry::new(20, tx)));
        let feed_state = Arc::new(FeedState::new());
        let state = Arc::new(HttpServerState::new(
            "1.2.3".to_string(),
            service.clone(),
            Arc::clone(&feed_state),
        ));
        (create_router(state), feed_state, service)
    }

    async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    #[test]
    fn health_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Healthy).unwrap(),
            "\"healthy\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Unhealthy).unwrap(),
            "\"unhealthy\""
        );
    }

    #[test]
    fn status_from_connection_state() {
        assert_eq!(
            HealthStatus::from(ConnectionState::Streaming),
            HealthStatus::Healthy
        );
        assert_eq!(
            HealthStatus::from(ConnectionState::Backoff),
            HealthStatus::Degraded
        );
        assert_eq!(
            HealthStatus::from(ConnectionState::Disconnected),
            HealthStatus::Unhealthy
        );
    }

    #[tokio::test]
    async fn liveness_is_always_ok() {
        let (app, _, _) = app();
        let (status, body) = get(&app, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");
    }

    #[tokio::test]
    async fn readiness_follows_streaming_state() {
        let (app, feed_state, _) = app();

        let (status, _) = get(&app, "/readyz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        feed_state.set_state(ConnectionState::Streaming);
        let (status, body) = get(&app, "/readyz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"READY");

        feed_state.set_state(ConnectionState::Backoff);
        let (status, _) = get(&app, "/readyz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn health_reports_feed_and_subscriptions() {
        let (app, feed_state, service) = app();
        service.subscribe("005930").unwrap();
        feed_state.set_state(ConnectionState::Streaming);
        feed_state.set_remote_subscriptions(1);
        feed_state.increment_frames();

        let (status, body) = get(&app, "/health").await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["version"], "1.2.3");
        assert_eq!(json["feed"]["state"], "streaming");
        assert_eq!(json["feed"]["frames_received"], 1);
        assert_eq!(json["subscriptions"]["desired"], 1);
        assert_eq!(json["subscriptions"]["remote"], 1);
        assert_eq!(json["subscriptions"]["capacity"], 20);
    }

    #[tokio::test]
    async fn health_is_unavailable_before_loop_starts() {
        let (app, _, _) = app();
        let (status, _) = get(&app, "/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}

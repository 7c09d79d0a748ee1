//! KIS Tick Bridge Binary
//!
//! Starts the tick bridge.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin kis-tick-bridge
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `KIS_APPROVAL_KEY`: WebSocket approval key
//!
//! ## Optional
//! - `KIS_CUSTTYPE`: P | B (default: P)
//! - `KIS_ENV`: PAPER | LIVE (default: PAPER)
//! - `KIS_WS_URL`: Overrides the environment's WebSocket URL
//! - `KIS_TR_ID`: Feed type (default: H0STCNT0)
//! - `BRIDGE_HTTP_PORT`: Control/health HTTP port (default: 5000)
//! - `BRIDGE_MAX_SUBSCRIPTIONS`: Desired set capacity (default: 20)
//! - `BRIDGE_RECEIVE_TIMEOUT_MS`: Receive timeout per cycle (default: 1000)
//! - `BRIDGE_RECONNECT_DELAY_INITIAL_MS`: First backoff delay (default: 1000)
//! - `BRIDGE_RECONNECT_DELAY_MAX_SECS`: Backoff ceiling (default: 10)
//! - `BRIDGE_RECONNECT_DELAY_MULTIPLIER`: Backoff multiplier (default: 2.0)
//! - `BRIDGE_RECONNECT_JITTER`: Backoff jitter fraction (default: 0.0)
//! - `BRIDGE_INTENT_CAPACITY`: Intent channel bound (default: 256)
//! - `BRIDGE_FORWARD_QUEUE_CAPACITY`: Forward queue bound (default: 1024)
//! - `FORWARD_URL`: Downstream endpoint (default: <http://localhost:8484/api/stocks/realtime>)
//! - `FORWARD_TIMEOUT_SECS`: Downstream request timeout (default: 5)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4318>)
//! - `OTEL_SERVICE_NAME`: Service name (default: kis-tick-bridge)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use kis_tick_bridge::domain::subscription::intent;
use kis_tick_bridge::infrastructure::http::{HttpServer, HttpServerState};
use kis_tick_bridge::infrastructure::telemetry;
use kis_tick_bridge::{
    BridgeConfig, FeedState, HttpTickSink, KisConnector, StreamConfig, StreamConnectionManager,
    SubscriptionRegistry, SubscriptionService, TickForwarder, forward_queue, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    load_dotenv();

    let config = BridgeConfig::from_env()?;

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init(&config.telemetry);

    tracing::info!("Starting KIS Tick Bridge");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Desired set and the intent channel feeding the connection loop
    let (intent_tx, intent_rx) = intent::channel(config.subscriptions.intent_capacity);
    let registry = Arc::new(SubscriptionRegistry::new(
        config.subscriptions.max_subscriptions,
        intent_tx,
    ));
    let subscriptions = SubscriptionService::new(Arc::clone(&registry));
    let feed_state = Arc::new(FeedState::new());

    // Forwarder
    let sink = Arc::new(HttpTickSink::from_settings(&config.forwarder)?);
    let (tick_tx, tick_rx) = forward_queue(config.forwarder.queue_capacity);
    let forwarder = TickForwarder::new(tick_rx, sink, shutdown_token.clone());
    let forwarder_handle = tokio::spawn(forwarder.run());

    // Connection loop
    let manager = StreamConnectionManager::new(
        StreamConfig::from_upstream_settings(&config.upstream),
        Arc::new(KisConnector::new(config.upstream.url.clone())),
        Arc::clone(&registry),
        intent_rx,
        tick_tx,
        Arc::clone(&feed_state),
        shutdown_token.clone(),
    );
    let manager_handle = tokio::spawn(manager.run());

    // HTTP server
    let http_state = Arc::new(HttpServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        subscriptions,
        Arc::clone(&feed_state),
    ));
    let http_server = HttpServer::new(
        config.server.http_port,
        http_state,
        shutdown_token.clone(),
    );
    let http_cancel = shutdown_token.clone();
    let http_handle = tokio::spawn(async move {
        if let Err(e) = http_server.run().await {
            tracing::error!(error = %e, "HTTP server error");
            http_cancel.cancel();
        }
    });

    tracing::info!("Tick bridge ready");

    await_shutdown(shutdown_token).await;

    let stopped = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        let _ = manager_handle.await;
        let _ = forwarder_handle.await;
        let _ = http_handle.await;
    })
    .await;

    if stopped.is_err() {
        tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Shutdown timed out, exiting anyway"
        );
    }

    tracing::info!("Tick bridge stopped");
    Ok(())
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }
}

/// Log the parsed configuration.
fn log_config(config: &BridgeConfig) {
    tracing::info!(
        environment = config.environment.as_str(),
        url = %config.upstream.url,
        tr_id = %config.upstream.tr_id,
        http_port = config.server.http_port,
        max_subscriptions = config.subscriptions.max_subscriptions,
        forward_url = %config.forwarder.url,
        otlp_enabled = config.telemetry.otlp_enabled,
        "Configuration loaded"
    );
    tracing::debug!(
        receive_timeout_ms = u64::try_from(config.upstream.receive_timeout.as_millis()).unwrap_or(u64::MAX),
        reconnect_initial_ms =
            u64::try_from(config.upstream.reconnect_delay_initial.as_millis()).unwrap_or(u64::MAX),
        reconnect_max_secs = config.upstream.reconnect_delay_max.as_secs(),
        intent_capacity = config.subscriptions.intent_capacity,
        forward_queue_capacity = config.forwarder.queue_capacity,
        "Stream tuning"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv_from_ancestors() {
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM, SIGINT, or an internal cancel).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
        () = shutdown_token.cancelled() => {
            tracing::info!("Internal shutdown requested");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}

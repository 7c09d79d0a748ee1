#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! KIS Tick Bridge - Subscription-Controlled Tick Relay
//!
//! Keeps one WebSocket session to the Korea Investment & Securities
//! real-time feed subscribed to exactly the symbols callers ask for, and
//! forwards matching ticks to a downstream HTTP service.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core types and rules with no I/O
//!   - `subscription`: Symbols, the desired-set registry, the intent channel
//!   - `streaming`: Ticks, remote-active set bookkeeping, feed state
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Upstream connection and downstream sink interfaces
//!   - `services`: Subscription control, tick forwarding
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `kis`: Wire messages, codec, WebSocket connection, connection loop
//!   - `forwarder`: HTTP tick sink
//!   - `http`: Control API, health probes, metrics endpoint
//!   - `config`: Environment-driven configuration
//!
//! # Data Flow
//!
//! ```text
//! HTTP caller ──► registry ──► intent channel ──┐
//!                    │                          ▼
//!                    │                  connection loop ◄──► KIS WebSocket
//!                    │                          │
//!                    └──── desired filter ◄─────┘
//!                                 │
//!                                 ▼
//!                        forward queue ──► forwarder ──► downstream HTTP
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no external I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::streaming::{ConnectionState, FeedSnapshot, FeedState, Tick};
pub use domain::subscription::{
    IntentEvent, SubscribeOutcome, SubscriptionError, SubscriptionRegistry, Symbol, SymbolError,
};

// Application
pub use application::ports::{FeedConnection, FeedConnector, ForwardError, StreamError, TickSink};
pub use application::services::{SubscriptionService, TickForwarder, forward_queue};

// Infrastructure config
pub use infrastructure::config::{
    BridgeConfig, ConfigError, Credentials, Environment, ForwarderSettings, ServerSettings,
    SubscriptionSettings, TelemetrySettings, UpstreamSettings,
};

// Upstream stream
pub use infrastructure::kis::{KisConnector, StreamConfig, StreamConnectionManager};

// Downstream sink
pub use infrastructure::forwarder::HttpTickSink;

// HTTP server
pub use infrastructure::http::{HttpServer, HttpServerError, HttpServerState, create_router};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryError, TelemetryGuard, init as init_telemetry};

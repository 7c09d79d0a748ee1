//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// KIS real-time WebSocket client and connection loop.
pub mod kis;

/// HTTP sink for forwarded ticks.
pub mod forwarder;

/// Configuration loading.
pub mod config;

/// Control API, health probes and metrics endpoint.
pub mod http;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;

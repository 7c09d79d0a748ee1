//! Prometheus Metrics Module
//!
//! Exposes bridge metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Frames**: Inbound frames, decode errors, outbound control frames
//! - **Ticks**: Forwarded and dropped ticks, forward errors and latency
//! - **Connection**: Upstream state, reconnects, connection errors
//! - **Subscriptions**: Desired and remote-active set sizes
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the HTTP control port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::domain::streaming::ConnectionState;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            let handle = builder
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Frames
    describe_counter!(
        "kis_bridge_frames_received_total",
        "Total text frames received from the upstream feed"
    );
    describe_counter!(
        "kis_bridge_decode_errors_total",
        "Total inbound frames that failed to decode"
    );
    describe_counter!(
        "kis_bridge_control_frames_sent_total",
        "Total subscribe/unsubscribe frames sent upstream by direction"
    );

    // Ticks
    describe_counter!(
        "kis_bridge_ticks_forwarded_total",
        "Total ticks delivered to the downstream sink"
    );
    describe_counter!(
        "kis_bridge_ticks_dropped_total",
        "Total ticks dropped before delivery by reason"
    );
    describe_counter!(
        "kis_bridge_forward_errors_total",
        "Total failed deliveries to the downstream sink"
    );
    describe_histogram!(
        "kis_bridge_forward_duration_seconds",
        "Time spent delivering one tick downstream"
    );

    // Connection
    describe_gauge!(
        "kis_bridge_connection_state",
        "Upstream connection state (0 disconnected .. 4 backoff)"
    );
    describe_counter!(
        "kis_bridge_reconnects_total",
        "Total upstream reconnection attempts"
    );
    describe_counter!(
        "kis_bridge_connection_errors_total",
        "Total upstream connection errors by kind"
    );

    // Subscriptions
    describe_gauge!(
        "kis_bridge_desired_subscriptions",
        "Number of symbols callers want streamed"
    );
    describe_gauge!(
        "kis_bridge_remote_subscriptions",
        "Number of symbols subscribed on the current connection"
    );
    describe_counter!(
        "kis_bridge_intents_dropped_total",
        "Total subscription intents dropped because the channel was full"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Why a decoded tick never reached the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Symbol is no longer in the desired set.
    Unsubscribed,
    /// Forward queue was full.
    QueueFull,
    /// Forwarder has stopped.
    QueueClosed,
}

impl DropReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Unsubscribed => "unsubscribed",
            Self::QueueFull => "queue_full",
            Self::QueueClosed => "queue_closed",
        }
    }
}

/// Record a text frame received upstream.
pub fn record_frame_received() {
    counter!("kis_bridge_frames_received_total").increment(1);
}

/// Record a frame that failed to decode.
pub fn record_decode_error() {
    counter!("kis_bridge_decode_errors_total").increment(1);
}

/// Record a subscribe or unsubscribe frame sent upstream.
pub fn record_control_frame(direction: &'static str) {
    counter!(
        "kis_bridge_control_frames_sent_total",
        "direction" => direction
    )
    .increment(1);
}

/// Record a tick delivered downstream.
pub fn record_tick_forwarded() {
    counter!("kis_bridge_ticks_forwarded_total").increment(1);
}

/// Record a tick dropped before delivery.
pub fn record_tick_dropped(reason: DropReason) {
    counter!(
        "kis_bridge_ticks_dropped_total",
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// Record a failed delivery.
pub fn record_forward_error() {
    counter!("kis_bridge_forward_errors_total").increment(1);
}

/// Record how long one delivery took.
pub fn record_forward_duration(duration: Duration) {
    histogram!("kis_bridge_forward_duration_seconds").record(duration.as_secs_f64());
}

/// Update the connection state gauge.
pub fn set_connection_state(state: ConnectionState) {
    gauge!("kis_bridge_connection_state").set(f64::from(state.code()));
}

/// Record an upstream reconnection attempt.
pub fn record_reconnect() {
    counter!("kis_bridge_reconnects_total").increment(1);
}

/// Record an upstream connection error.
pub fn record_connection_error(kind: &'static str) {
    counter!(
        "kis_bridge_connection_errors_total",
        "kind" => kind
    )
    .increment(1);
}

/// Update the desired set size.
#[allow(clippy::cast_precision_loss)]
pub fn set_desired_subscriptions(count: usize) {
    gauge!("kis_bridge_desired_subscriptions").set(count as f64);
}

/// Update the remote-active set size.
#[allow(clippy::cast_precision_loss)]
pub fn set_remote_subscriptions(count: usize) {
    gauge!("kis_bridge_remote_subscriptions").set(count as f64);
}

/// Publish the running total of dropped intents.
pub fn set_intents_dropped(total: u64) {
    counter!("kis_bridge_intents_dropped_total").absolute(total);
}

// =============================================================================
// Tests
// =============================================================================

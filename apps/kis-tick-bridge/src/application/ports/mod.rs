//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `FeedConnector` / `FeedConnection`: the upstream real-time WebSocket
//! - `TickSink`: the downstream service that receives forwarded ticks

use async_trait::async_trait;

use crate::domain::streaming::Tick;

// =============================================================================
// Upstream Feed
// =============================================================================

/// Connection-level failures. Every variant sends the loop to backoff.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Opening the connection failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Writing a frame failed.
    #[error("send failed: {0}")]
    Send(String),

    /// Reading a frame failed.
    #[error("receive failed: {0}")]
    Receive(String),

    /// An outbound frame could not be built.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The peer closed the connection or the stream ended.
    #[error("connection closed by peer")]
    ConnectionClosed,
}

impl StreamError {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect",
            Self::Send(_) => "send",
            Self::Receive(_) => "receive",
            Self::Protocol(_) => "protocol",
            Self::ConnectionClosed => "closed",
        }
    }
}

/// Opens upstream connections. One call per connection epoch.
#[async_trait]
pub trait FeedConnector: Send + Sync {
    /// Open a fresh connection.
    async fn connect(&self) -> Result<Box<dyn FeedConnection>, StreamError>;
}

/// An open upstream connection carrying text frames.
///
/// `recv` must be cancel-safe: the loop wraps it in a short timeout and
/// drops the future when the timeout fires.
#[async_trait]
pub trait FeedConnection: Send {
    /// Send one text frame.
    async fn send_text(&mut self, text: String) -> Result<(), StreamError>;

    /// Wait for the next text payload.
    ///
    /// Returns `StreamError::ConnectionClosed` when the peer goes away.
    async fn recv(&mut self) -> Result<String, StreamError>;

    /// Close the connection. Errors are ignored.
    async fn close(&mut self);
}

// =============================================================================
// Downstream Sink
// =============================================================================

/// Failures delivering a tick downstream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForwardError {
    /// Transport failure or timeout.
    #[error("network error: {0}")]
    Network(String),

    /// The sink answered with a non-success status.
    #[error("downstream returned status {0}")]
    Status(u16),
}

/// Receives accepted ticks.
#[async_trait]
pub trait TickSink: Send + Sync {
    /// Deliver one tick. Callers log and drop failures.
    async fn forward(&self, tick: &Tick) -> Result<(), ForwardError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_error_kinds() {
        assert_eq!(StreamError::Connect("x".into()).kind(), "connect");
        assert_eq!(StreamError::Send("x".into()).kind(), "send");
        assert_eq!(StreamError::Receive("x".into()).kind(), "receive");
        assert_eq!(StreamError::Protocol("x".into()).kind(), "protocol");
        assert_eq!(StreamError::ConnectionClosed.kind(), "closed");
    }

    #[test]
    fn forward_error_display() {
        assert_eq!(
            ForwardError::Status(502).to_string(),
            "downstream returned status 502"
        );
    }
}

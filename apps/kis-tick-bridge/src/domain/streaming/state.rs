//! Connection State
//!
//! Observable status of the upstream connection loop. Written only by the
//! loop, read by the health endpoints.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// State of the upstream connection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection and no attempt in progress.
    #[default]
    Disconnected,
    /// Opening the WebSocket.
    Connecting,
    /// Sending the initial subscribe frames for the desired set.
    SubscribingInitial,
    /// Steady-state receive and reconcile loop.
    Streaming,
    /// Waiting before the next connection attempt.
    Backoff,
}

impl ConnectionState {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::SubscribingInitial => "subscribing_initial",
            Self::Streaming => "streaming",
            Self::Backoff => "backoff",
        }
    }

    /// Numeric code for the state gauge.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::SubscribingInitial => 2,
            Self::Streaming => 3,
            Self::Backoff => 4,
        }
    }
}

/// Shared, lock-light view of the connection loop.
#[derive(Debug, Default)]
pub struct FeedState {
    state: RwLock<ConnectionState>,
    last_connected_at: RwLock<Option<DateTime<Utc>>>,
    last_error: RwLock<Option<String>>,
    epoch: AtomicU64,
    remote_subscriptions: AtomicUsize,
    reconnect_attempts: AtomicU64,
    frames_received: AtomicU64,
    ticks_forwarded: AtomicU64,
}

impl FeedState {
    /// Create a state in `Disconnected`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection state.
    ///
    /// Entering `Streaming` records the connect time and clears the retry
    /// counter and last error.
    pub fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
        if state == ConnectionState::Streaming {
            *self.last_connected_at.write() = Some(Utc::now());
            *self.last_error.write() = None;
            self.reconnect_attempts.store(0, Ordering::Relaxed);
        }
    }

    /// Record the most recent connection error.
    pub fn set_error(&self, message: String) {
        *self.last_error.write() = Some(message);
    }

    /// Record the epoch of the connection now in use.
    pub fn set_epoch(&self, epoch: u64) {
        self.epoch.store(epoch, Ordering::Relaxed);
    }

    /// Update the active remote subscription count.
    pub fn set_remote_subscriptions(&self, count: usize) {
        self.remote_subscriptions.store(count, Ordering::Relaxed);
    }

    /// Increment reconnect attempts.
    pub fn increment_reconnect_attempts(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment inbound frame counter.
    pub fn increment_frames(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment forwarded tick counter.
    pub fn increment_ticks(&self) {
        self.ticks_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Check if the loop is streaming.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.state() == ConnectionState::Streaming
    }

    /// Copy every field for reporting.
    #[must_use]
    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            state: self.state(),
            last_connected_at: *self.last_connected_at.read(),
            last_error: self.last_error.read().clone(),
            epoch: self.epoch.load(Ordering::Relaxed),
            remote_subscriptions: self.remote_subscriptions.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            ticks_forwarded: self.ticks_forwarded.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`FeedState`].
#[derive(Debug, Clone, Serialize)]
pub struct FeedSnapshot {
    /// Connection state.
    pub state: ConnectionState,
    /// When the loop last reached `Streaming`.
    pub last_connected_at: Option<DateTime<Utc>>,
    /// Most recent connection error.
    pub last_error: Option<String>,
    /// Connection epoch.
    pub epoch: u64,
    /// Symbols subscribed on the current connection.
    pub remote_subscriptions: usize,
    /// Failed attempts since the last successful connection.
    pub reconnect_attempts: u64,
    /// Inbound frames received.
    pub frames_received: u64,
    /// Ticks handed to the forwarder.
    pub ticks_forwarded: u64,
}

//! Stream Connection Manager
//!
//! Owns the single upstream connection and runs the cooperative loop that
//! keeps its subscriptions in line with the desired set.
//!
//! # State Machine
//!
//! ```text
//! Disconnected → Connecting ──ok──→ SubscribingInitial → Streaming
//!                    │                      │                 │
//!                    └──err──→ Backoff ←────┴───────err───────┘
//!                                 │
//!                                 └──delay──→ Connecting
//! ```
//!
//! Each connection is one epoch. The remote-active set is cleared when an
//! epoch begins and when it ends; a new connection starts from the desired
//! set snapshot, never from the previous connection's bookkeeping.
//!
//! # Streaming Cycle
//!
//! 1. Drain queued intents and send the frames they still call for
//! 2. Wait up to the receive timeout for one inbound frame
//! 3. Decode it, echo heartbeats, filter ticks against the desired set
//! 4. Correct drift between the remote-active and desired sets

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use super::auth::Credentials;
use super::codec::{InboundFrame, KisCodec};
use super::messages::{H0STCNT0_RECORD_WIDTH, TrType};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::UpstreamSettings;
use crate::application::ports::{FeedConnection, FeedConnector, StreamError};
use crate::domain::streaming::{
    ConnectionState, FeedState, RemoteCommand, RemoteSubscriptions, Tick,
};
use crate::domain::subscription::{IntentReceiver, SubscriptionRegistry};
use crate::infrastructure::metrics::{self, DropReason};

/// Loop settings.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Approval key and customer type.
    pub credentials: Credentials,
    /// Feed type subscribed to.
    pub tr_id: String,
    /// Fields per record for batched data frames.
    pub record_width: usize,
    /// Longest single wait for an inbound frame.
    pub receive_timeout: Duration,
    /// Backoff between connection attempts.
    pub reconnect: ReconnectConfig,
}

impl StreamConfig {
    /// Create configuration with defaults for `credentials`.
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            tr_id: super::messages::DEFAULT_TR_ID.to_string(),
            record_width: H0STCNT0_RECORD_WIDTH,
            receive_timeout: Duration::from_secs(1),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Create configuration from `UpstreamSettings`.
    #[must_use]
    pub fn from_upstream_settings(settings: &UpstreamSettings) -> Self {
        Self {
            credentials: settings.credentials.clone(),
            tr_id: settings.tr_id.clone(),
            record_width: H0STCNT0_RECORD_WIDTH,
            receive_timeout: settings.receive_timeout,
            reconnect: ReconnectConfig::from_upstream_settings(settings),
        }
    }
}

/// Runs the connection state machine until cancelled.
pub struct StreamConnectionManager {
    config: StreamConfig,
    codec: KisCodec,
    connector: Arc<dyn FeedConnector>,
    registry: Arc<SubscriptionRegistry>,
    intents: IntentReceiver,
    ticks: mpsc::Sender<Tick>,
    feed_state: Arc<FeedState>,
    cancel: CancellationToken,
    remote: RemoteSubscriptions,
}

impl StreamConnectionManager {
    /// Create a manager. Nothing happens until [`run`](Self::run).
    #[must_use]
    pub fn new(
        config: StreamConfig,
        connector: Arc<dyn FeedConnector>,
        registry: Arc<SubscriptionRegistry>,
        intents: IntentReceiver,
        ticks: mpsc::Sender<Tick>,
        feed_state: Arc<FeedState>,
        cancel: CancellationToken,
    ) -> Self {
        let codec = KisCodec::new(config.tr_id.clone(), config.record_width);
        Self {
            config,
            codec,
            connector,
            registry,
            intents,
            ticks,
            feed_state,
            cancel,
            remote: RemoteSubscriptions::new(),
        }
    }

    /// Run the connection loop. Returns only after cancellation.
    pub async fn run(mut self) {
        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            self.enter(ConnectionState::Connecting);

            let connected = tokio::select! {
                () = self.cancel.cancelled() => break,
                result = self.connector.connect() => result,
            };

            match connected {
                Ok(mut connection) => {
                    let result = self.run_connection(connection.as_mut(), &mut policy).await;

                    connection.close().await;
                    self.end_epoch();

                    match result {
                        Ok(()) => break,
                        Err(e) => self.record_failure(&e),
                    }
                }
                Err(e) => self.record_failure(&e),
            }

            self.enter(ConnectionState::Backoff);
            let delay = policy.next_delay();
            self.feed_state.increment_reconnect_attempts();
            metrics::record_reconnect();
            tracing::info!(
                attempt = policy.attempt_count(),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Reconnecting to KIS stream"
            );

            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.enter(ConnectionState::Disconnected);
        tracing::info!("Stream connection manager stopped");
    }

    /// Drive one connection from initial subscribe until error or shutdown.
    ///
    /// `Ok(())` means shutdown was requested.
    async fn run_connection(
        &mut self,
        connection: &mut dyn FeedConnection,
        policy: &mut ReconnectPolicy,
    ) -> Result<(), StreamError> {
        let epoch = self.remote.begin_epoch();
        self.feed_state.set_epoch(epoch);
        self.publish_remote_count();
        self.enter(ConnectionState::SubscribingInitial);

        // The snapshot below covers anything queued before this connection.
        let stale = self.intents.drain_all();
        if !stale.is_empty() {
            tracing::debug!(count = stale.len(), epoch, "Discarded pre-connection intents");
        }

        let desired = self.registry.snapshot();
        for symbol in desired {
            self.send_command(connection, RemoteCommand::Subscribe(symbol))
                .await?;
        }

        policy.reset();
        self.enter(ConnectionState::Streaming);
        tracing::info!(
            epoch,
            tr_id = self.codec.tr_id(),
            subscriptions = self.remote.len(),
            "KIS stream connected"
        );

        loop {
            self.reconcile_intents(connection).await?;

            let received = tokio::select! {
                () = self.cancel.cancelled() => return Ok(()),
                received = tokio::time::timeout(self.config.receive_timeout, connection.recv()) => received,
            };

            match received {
                Ok(Ok(text)) => self.handle_frame(connection, &text).await?,
                Ok(Err(e)) => return Err(e),
                Err(_elapsed) => {}
            }

            self.correct_drift(connection).await?;
        }
    }

    /// Apply queued intents in order.
    async fn reconcile_intents(
        &mut self,
        connection: &mut dyn FeedConnection,
    ) -> Result<(), StreamError> {
        let events = self.intents.drain_all();
        metrics::set_intents_dropped(self.intents.dropped());

        if events.is_empty() {
            return Ok(());
        }

        let desired = self.registry.snapshot();
        for event in &events {
            match self.remote.command_for(event, &desired) {
                Some(command) => self.send_command(connection, command).await?,
                None => tracing::trace!(
                    intent = event.as_str(),
                    symbol = %event.symbol(),
                    "Intent needs no frame"
                ),
            }
        }
        Ok(())
    }

    /// Make the remote-active set match the desired set.
    async fn correct_drift(&mut self, connection: &mut dyn FeedConnection) -> Result<(), StreamError> {
        let desired = self.registry.snapshot();
        for command in self.remote.drift(&desired) {
            tracing::debug!(
                direction = command.direction(),
                symbol = %command.symbol(),
                "Correcting subscription drift"
            );
            self.send_command(connection, command).await?;
        }
        Ok(())
    }

    /// Send one registration frame and record it on success.
    async fn send_command(
        &mut self,
        connection: &mut dyn FeedConnection,
        command: RemoteCommand,
    ) -> Result<(), StreamError> {
        let tr_type = match command {
            RemoteCommand::Subscribe(_) => TrType::Subscribe,
            RemoteCommand::Unsubscribe(_) => TrType::Unsubscribe,
        };

        let frame = self
            .codec
            .encode_request(
                self.config.credentials.approval_key(),
                self.config.credentials.custtype().as_str(),
                tr_type,
                command.symbol(),
            )
            .map_err(|e| StreamError::Protocol(e.to_string()))?;

        connection.send_text(frame).await?;

        self.remote.apply(&command);
        self.publish_remote_count();
        metrics::record_control_frame(command.direction());
        tracing::info!(
            direction = command.direction(),
            symbol = %command.symbol(),
            epoch = self.remote.epoch(),
            "Control frame sent"
        );
        Ok(())
    }

    /// Decode one inbound payload. Only heartbeat echo failures are errors.
    async fn handle_frame(
        &mut self,
        connection: &mut dyn FeedConnection,
        text: &str,
    ) -> Result<(), StreamError> {
        self.feed_state.increment_frames();
        metrics::record_frame_received();

        match self.codec.decode(text) {
            Ok(InboundFrame::Ticks { ticks, rejected }) => {
                for e in rejected {
                    metrics::record_decode_error();
                    tracing::warn!(error = %e, "Skipping malformed record in batched frame");
                }
                for tick in ticks {
                    self.accept_tick(tick);
                }
            }
            Ok(InboundFrame::Control(control)) if control.is_pingpong() => {
                connection.send_text(text.to_string()).await?;
                tracing::debug!("Heartbeat echoed");
            }
            Ok(InboundFrame::Control(control)) => {
                let accepted = control.is_success();
                let body = control.body.unwrap_or_default();
                if accepted {
                    tracing::debug!(
                        tr_id = %control.header.tr_id,
                        symbol = %control.header.tr_key,
                        msg = %body.msg1,
                        "Control acknowledged"
                    );
                } else {
                    tracing::warn!(
                        tr_id = %control.header.tr_id,
                        symbol = %control.header.tr_key,
                        code = %body.msg_cd,
                        msg = %body.msg1,
                        "Control request rejected"
                    );
                }
            }
            Ok(InboundFrame::Ignored) => {
                tracing::trace!("Ignoring frame for another feed");
            }
            Err(e) => {
                metrics::record_decode_error();
                tracing::warn!(
                    error = %e,
                    frame = %text.chars().take(64).collect::<String>(),
                    "Discarding malformed frame"
                );
            }
        }
        Ok(())
    }

    /// Filter a tick against the desired set and queue it for forwarding.
    fn accept_tick(&self, tick: Tick) {
        if !self.registry.contains(tick.symbol.as_str()) {
            metrics::record_tick_dropped(DropReason::Unsubscribed);
            tracing::debug!(symbol = %tick.symbol, "Dropping tick for undesired symbol");
            return;
        }

        match self.ticks.try_send(tick) {
            Ok(()) => self.feed_state.increment_ticks(),
            Err(TrySendError::Full(tick)) => {
                metrics::record_tick_dropped(DropReason::QueueFull);
                tracing::warn!(symbol = %tick.symbol, "Forward queue full, dropping tick");
            }
            Err(TrySendError::Closed(tick)) => {
                metrics::record_tick_dropped(DropReason::QueueClosed);
                tracing::debug!(symbol = %tick.symbol, "Forwarder stopped, dropping tick");
            }
        }
    }

    fn end_epoch(&mut self) {
        self.remote.clear();
        self.publish_remote_count();
    }

    fn record_failure(&self, error: &StreamError) {
        self.feed_state.set_error(error.to_string());
        metrics::record_connection_error(error.kind());
        tracing::warn!(
            error = %error,
            kind = error.kind(),
            epoch = self.remote.epoch(),
            "KIS stream connection error"
        );
    }

    fn enter(&self, state: ConnectionState) {
        self.feed_state.set_state(state);
        metrics::set_connection_state(state);
        tracing::debug!(state = state.as_str(), "Connection state changed");
    }

    fn publish_remote_count(&self) {
        self.feed_state.set_remote_subscriptions(self.remote.len());
        metrics::set_remote_subscriptions(self.remote.len());
    }
}

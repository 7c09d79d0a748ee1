//! Tick forwarding.
//!
//! The connection loop hands accepted ticks to a bounded queue with
//! `try_send` and moves on; this task drains the queue into the sink. A
//! failed delivery is logged and dropped, never retried.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::application::ports::TickSink;
use crate::domain::streaming::Tick;
use crate::infrastructure::metrics;

/// Default number of ticks buffered between the loop and the forwarder.
pub const DEFAULT_FORWARD_QUEUE_CAPACITY: usize = 1024;

/// Create the queue between the connection loop and the forwarder.
#[must_use]
pub fn forward_queue(capacity: usize) -> (mpsc::Sender<Tick>, mpsc::Receiver<Tick>) {
    mpsc::channel(capacity.max(1))
}

/// Drains the tick queue into a [`TickSink`].
pub struct TickForwarder {
    rx: mpsc::Receiver<Tick>,
    sink: Arc<dyn TickSink>,
    cancel: CancellationToken,
}

impl TickForwarder {
    /// Create a forwarder.
    #[must_use]
    pub fn new(rx: mpsc::Receiver<Tick>, sink: Arc<dyn TickSink>, cancel: CancellationToken) -> Self {
        Self { rx, sink, cancel }
    }

    /// Run until cancelled or the queue closes.
    pub async fn run(mut self) {
        loop {
            let tick = tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::info!("Tick forwarder cancelled");
                    return;
                }
                tick = self.rx.recv() => tick,
            };

            let Some(tick) = tick else {
                tracing::info!("Tick queue closed, forwarder stopping");
                return;
            };

            let started = Instant::now();
            let result = self.sink.forward(&tick).await;
            metrics::record_forward_duration(started.elapsed());

            match result {
                Ok(()) => {
                    metrics::record_tick_forwarded();
                    tracing::debug!(
                        symbol = %tick.symbol,
                        price = %tick.current_price,
                        "Tick forwarded"
                    );
                }
                Err(e) => {
                    metrics::record_forward_error();
                    tracing::warn!(symbol = %tick.symbol, error = %e, "Tick forward failed");
                }
            }
        }
    }
}

//! Intent Channel
//!
//! Ordered hand-off of subscription changes from the control side to the
//! connection loop. Publishing never blocks: the channel is bounded and a
//! full channel drops the intent (the connection loop's drift correction
//! recovers from the desired set). Draining never blocks either.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

use super::Symbol;

/// A single subscription change requested by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IntentEvent {
    /// The symbol was added to the desired set.
    Subscribe(Symbol),
    /// The symbol was removed from the desired set.
    Unsubscribe(Symbol),
}

impl IntentEvent {
    /// Symbol the intent refers to.
    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        match self {
            Self::Subscribe(symbol) | Self::Unsubscribe(symbol) => symbol,
        }
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Subscribe(_) => "subscribe",
            Self::Unsubscribe(_) => "unsubscribe",
        }
    }
}

/// Default number of intents that can be queued before new ones are dropped.
pub const DEFAULT_INTENT_CAPACITY: usize = 256;

/// Create a bounded intent channel.
///
/// A zero capacity is bumped to one because tokio rejects empty channels.
#[must_use]
pub fn channel(capacity: usize) -> (IntentPublisher, IntentReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        IntentPublisher {
            tx,
            dropped: Arc::clone(&dropped),
        },
        IntentReceiver { rx, dropped },
    )
}

/// Producer half, held by the subscription registry.
#[derive(Debug, Clone)]
pub struct IntentPublisher {
    tx: mpsc::Sender<IntentEvent>,
    dropped: Arc<AtomicU64>,
}

impl IntentPublisher {
    /// Enqueue an intent without waiting.
    ///
    /// Returns `false` if the intent was dropped.
    pub fn publish(&self, event: IntentEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    intent = event.as_str(),
                    symbol = %event.symbol(),
                    "Intent channel full, dropping intent"
                );
                false
            }
            Err(TrySendError::Closed(event)) => {
                tracing::debug!(
                    intent = event.as_str(),
                    symbol = %event.symbol(),
                    "Intent channel closed, connection loop has stopped"
                );
                false
            }
        }
    }
}

/// Consumer half, owned by the connection loop.
#[derive(Debug)]
pub struct IntentReceiver {
    rx: mpsc::Receiver<IntentEvent>,
    dropped: Arc<AtomicU64>,
}

impl IntentReceiver {
    /// Take every intent currently queued, in publish order.
    pub fn drain_all(&mut self) -> Vec<IntentEvent> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        events
    }

    /// Intents dropped because the channel was full, since creation.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

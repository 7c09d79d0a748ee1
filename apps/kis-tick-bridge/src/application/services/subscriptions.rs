//! Subscription control use cases.

use std::sync::Arc;

use crate::domain::subscription::{
    SubscribeOutcome, SubscriptionError, SubscriptionRegistry, Symbol,
};
use crate::infrastructure::metrics;

/// Control boundary over the desired set.
///
/// Cheap to clone; every clone shares the same registry.
#[derive(Debug, Clone)]
pub struct SubscriptionService {
    registry: Arc<SubscriptionRegistry>,
}

impl SubscriptionService {
    /// Wrap a shared registry.
    #[must_use]
    pub const fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        Self { registry }
    }

    /// Ask for a symbol to be streamed.
    ///
    /// # Errors
    ///
    /// Returns `SubscriptionError` for blank symbols or when the desired set
    /// is at capacity.
    pub fn subscribe(&self, raw: &str) -> Result<SubscribeOutcome, SubscriptionError> {
        match self.registry.add(raw) {
            Ok(outcome) => {
                let desired = self.registry.len();
                metrics::set_desired_subscriptions(desired);
                tracing::info!(
                    symbol = raw.trim(),
                    added = outcome == SubscribeOutcome::Added,
                    desired,
                    "Subscription requested"
                );
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!(symbol = raw.trim(), error = %e, "Subscription rejected");
                Err(e)
            }
        }
    }

    /// Stop streaming the given symbols. Unknown symbols are ignored.
    pub fn unsubscribe<I, S>(&self, raws: I) -> Vec<Symbol>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let removed = self.registry.remove(raws);
        let desired = self.registry.len();
        metrics::set_desired_subscriptions(desired);
        tracing::info!(removed = ?removed, desired, "Unsubscription requested");
        removed
    }

    /// Current desired symbols, sorted.
    #[must_use]
    pub fn list(&self) -> Vec<Symbol> {
        self.registry.sorted()
    }

    /// Number of desired symbols.
    #[must_use]
    pub fn count(&self) -> usize {
        self.registry.len()
    }

    /// Configured maximum.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.registry.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::subscription::{IntentEvent, intent};

    fn service(capacity: usize) -> (SubscriptionService, intent::IntentReceiver) {
        let (tx, rx) = intent::channel(32);
        let registry = Arc::new(SubscriptionRegistry::new(capacity, tx));
        (SubscriptionService::new(registry), rx)
    }

    #[test]
    fn subscribe_then_list() {
        let (service, mut rx) = service(3);

        service.subscribe("035720").unwrap();
        service.subscribe("005930").unwrap();

        let listed: Vec<_> = service.list().iter().map(ToString::to_string).collect();
        assert_eq!(listed, vec!["005930", "035720"]);
        assert_eq!(rx.drain_all().len(), 2);
    }

    #[test]
    fn capacity_rejection_surfaces() {
        let (service, _rx) = service(1);

        service.subscribe("A").unwrap();
        assert!(matches!(
            service.subscribe("B"),
            Err(SubscriptionError::AtCapacity { max: 1 })
        ));
        assert_eq!(service.count(), 1);
        assert_eq!(service.capacity(), 1);
    }

    #[test]
    fn unsubscribe_returns_removed_and_publishes() {
        let (service, mut rx) = service(3);

        service.subscribe("A").unwrap();
        rx.drain_all();

        let removed = service.unsubscribe(["A", "B"]);
        assert_eq!(removed.len(), 1);
        assert_eq!(
            rx.drain_all(),
            vec![IntentEvent::Unsubscribe(Symbol::parse("A").unwrap())]
        );
    }
}

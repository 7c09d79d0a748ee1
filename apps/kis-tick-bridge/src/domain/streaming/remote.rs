//! Remote Subscription Bookkeeping
//!
//! Tracks which symbols the *current* upstream connection has been told to
//! stream, and decides which control frames are needed to bring it in line
//! with the desired set. Owned exclusively by the connection loop, so it
//! carries no synchronization.

use std::collections::{BTreeSet, HashSet};

use crate::domain::subscription::{IntentEvent, Symbol};

/// A control frame the connection loop has to send.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RemoteCommand {
    /// Register the symbol on the connection.
    Subscribe(Symbol),
    /// Release the symbol on the connection.
    Unsubscribe(Symbol),
}

impl RemoteCommand {
    /// Symbol the command refers to.
    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        match self {
            Self::Subscribe(symbol) | Self::Unsubscribe(symbol) => symbol,
        }
    }

    /// Direction label for logs and metrics.
    #[must_use]
    pub const fn direction(&self) -> &'static str {
        match self {
            Self::Subscribe(_) => "subscribe",
            Self::Unsubscribe(_) => "unsubscribe",
        }
    }
}

/// The active remote set for one connection epoch.
#[derive(Debug, Default)]
pub struct RemoteSubscriptions {
    symbols: HashSet<Symbol>,
    epoch: u64,
}

impl RemoteSubscriptions {
    /// Create an empty set at epoch zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new connection epoch. Nothing from the old connection carries over.
    pub fn begin_epoch(&mut self) -> u64 {
        self.symbols.clear();
        self.epoch += 1;
        self.epoch
    }

    /// Forget everything after the connection was lost.
    pub fn clear(&mut self) {
        self.symbols.clear();
    }

    /// Current epoch number.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Number of remote subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Check if nothing is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Subscribed symbols in sorted order.
    #[must_use]
    pub fn sorted(&self) -> Vec<Symbol> {
        let mut symbols: Vec<_> = self.symbols.iter().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Record a command whose frame was sent successfully.
    pub fn apply(&mut self, command: &RemoteCommand) {
        match command {
            RemoteCommand::Subscribe(symbol) => {
                self.symbols.insert(symbol.clone());
            }
            RemoteCommand::Unsubscribe(symbol) => {
                self.symbols.remove(symbol);
            }
        }
    }

    /// Decide what to send for one intent.
    ///
    /// A subscribe intent whose symbol is no longer desired is stale and
    /// yields nothing, as does a subscribe for a symbol already active or an
    /// unsubscribe for a symbol that is not.
    #[must_use]
    pub fn command_for(
        &self,
        event: &IntentEvent,
        desired: &BTreeSet<Symbol>,
    ) -> Option<RemoteCommand> {
        match event {
            IntentEvent::Subscribe(symbol) => (desired.contains(symbol)
                && !self.symbols.contains(symbol))
            .then(|| RemoteCommand::Subscribe(symbol.clone())),
            IntentEvent::Unsubscribe(symbol) => self
                .symbols
                .contains(symbol)
                .then(|| RemoteCommand::Unsubscribe(symbol.clone())),
        }
    }

    /// Commands that make this set equal to `desired`.
    ///
    /// Unsubscribes come first (sorted), then subscribes (sorted), so the
    /// remote side never holds more than the larger of the two sets.
    #[must_use]
    pub fn drift(&self, desired: &BTreeSet<Symbol>) -> Vec<RemoteCommand> {
        let mut stale: Vec<_> = self
            .symbols
            .iter()
            .filter(|s| !desired.contains(*s))
            .cloned()
            .collect();
        stale.sort();

        let missing = desired.iter().filter(|s| !self.symbols.contains(*s));

        stale
            .into_iter()
            .map(RemoteCommand::Unsubscribe)
            .chain(missing.cloned().map(RemoteCommand::Subscribe))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sym(s: &str) -> Symbol {
        Symbol::parse(s).unwrap()
    }

    fn desired(symbols: &[&str]) -> BTreeSet<Symbol> {
        symbols.iter().map(|s| sym(s)).collect()
    }

    #[test]
    fn begin_epoch_clears_and_increments() {
        let mut remote = RemoteSubscriptions::new();
        remote.apply(&RemoteCommand::Subscribe(sym("A")));
        assert_eq!(remote.epoch(), 0);

        assert_eq!(remote.begin_epoch(), 1);
        assert!(remote.is_empty());
        assert_eq!(remote.begin_epoch(), 2);
    }

    #[test]
    fn subscribe_intent_for_desired_inactive_symbol() {
        let remote = RemoteSubscriptions::new();
        let cmd = remote.command_for(&IntentEvent::Subscribe(sym("A")), &desired(&["A"]));
        assert_eq!(cmd, Some(RemoteCommand::Subscribe(sym("A"))));
    }

    #[test]
    fn stale_subscribe_intent_is_ignored() {
        let remote = RemoteSubscriptions::new();
        let cmd = remote.command_for(&IntentEvent::Subscribe(sym("A")), &desired(&[]));
        assert_eq!(cmd, None);
    }

    #[test]
    fn duplicate_subscribe_intent_is_ignored() {
        let mut remote = RemoteSubscriptions::new();
        remote.apply(&RemoteCommand::Subscribe(sym("A")));
        let cmd = remote.command_for(&IntentEvent::Subscribe(sym("A")), &desired(&["A"]));
        assert_eq!(cmd, None);
    }

    #[test]
    fn unsubscribe_intent_only_for_active_symbol() {
        let mut remote = RemoteSubscriptions::new();
        assert_eq!(
            remote.command_for(&IntentEvent::Unsubscribe(sym("A")), &desired(&[])),
            None
        );

        remote.apply(&RemoteCommand::Subscribe(sym("A")));
        assert_eq!(
            remote.command_for(&IntentEvent::Unsubscribe(sym("A")), &desired(&[])),
            Some(RemoteCommand::Unsubscribe(sym("A")))
        );
    }

    #[test]
    fn drift_unsubscribes_extras_then_subscribes_missing() {
        let mut remote = RemoteSubscriptions::new();
        remote.apply(&RemoteCommand::Subscribe(sym("B")));
        remote.apply(&RemoteCommand::Subscribe(sym("A")));
        remote.apply(&RemoteCommand::Subscribe(sym("C")));

        let cmds = remote.drift(&desired(&["C", "D"]));

        assert_eq!(
            cmds,
            vec![
                RemoteCommand::Unsubscribe(sym("A")),
                RemoteCommand::Unsubscribe(sym("B")),
                RemoteCommand::Subscribe(sym("D")),
            ]
        );
    }

    #[test]
    fn drift_is_empty_when_in_sync() {
        let mut remote = RemoteSubscriptions::new();
        remote.apply(&RemoteCommand::Subscribe(sym("A")));
        assert!(remote.drift(&desired(&["A"])).is_empty());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(u8),
        Remove(u8),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![(0u8..6).prop_map(Op::Add), (0u8..6).prop_map(Op::Remove)]
    }

    proptest! {
        /// After intents are applied and one drift pass runs, the remote set
        /// equals the desired set, whatever order the changes arrived in.
        #[test]
        fn one_cycle_converges(ops in prop::collection::vec(op_strategy(), 0..40)) {
            let mut wanted = BTreeSet::new();
            let mut events = Vec::new();
            for op in ops {
                match op {
                    Op::Add(n) => {
                        let s = sym(&format!("S{n}"));
                        if wanted.insert(s.clone()) {
                            events.push(IntentEvent::Subscribe(s));
                        }
                    }
                    Op::Remove(n) => {
                        let s = sym(&format!("S{n}"));
                        if wanted.remove(&s) {
                            events.push(IntentEvent::Unsubscribe(s));
                        }
                    }
                }
            }

            let mut remote = RemoteSubscriptions::new();
            for event in &events {
                if let Some(cmd) = remote.command_for(event, &wanted) {
                    remote.apply(&cmd);
                }
            }
            // Intents alone never leave an undesired symbol subscribed
            for s in remote.sorted() {
                prop_assert!(wanted.contains(&s));
            }

            for cmd in remote.drift(&wanted) {
                remote.apply(&cmd);
            }
            prop_assert_eq!(remote.sorted(), wanted.iter().cloned().collect::<Vec<_>>());
        }
    }
}

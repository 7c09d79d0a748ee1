//! Subscription Registry
//!
//! Domain types for tracking which symbols callers currently want streamed.
//!
//! # Design
//!
//! The registry is the single source of truth for the desired set:
//! - Capacity-bounded; the capacity check and the insert happen under one lock
//! - Every effective change publishes an [`IntentEvent`] while the lock is
//!   still held, so intent order matches mutation order
//! - Snapshots are copies, never live views
//!
//! The connection loop never touches the lock across network I/O; it only
//! takes snapshots and membership checks.

pub mod intent;

use std::collections::BTreeSet;
use std::fmt;

use parking_lot::Mutex;

pub use intent::{IntentEvent, IntentPublisher, IntentReceiver};

// =============================================================================
// Symbol
// =============================================================================

/// A stock code as supplied by callers (e.g. `005930`).
///
/// Always trimmed and never empty.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(into = "String", try_from = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Normalize and validate a caller-supplied symbol.
    ///
    /// # Errors
    ///
    /// Returns `SymbolError::Empty` if the input is blank.
    pub fn parse(raw: &str) -> Result<Self, SymbolError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SymbolError::Empty);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The symbol text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Symbol {
    type Error = SymbolError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Invalid symbol input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbolError {
    /// Symbol was empty after trimming.
    #[error("symbol cannot be empty")]
    Empty,
}

// =============================================================================
// Errors and Outcomes
// =============================================================================

/// Rejections from the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    /// Symbol failed validation.
    #[error("invalid symbol: {0}")]
    InvalidSymbol(#[from] SymbolError),

    /// The desired set is full.
    #[error("subscription capacity reached ({max} symbols)")]
    AtCapacity {
        /// Configured maximum.
        max: usize,
    },
}

/// Result of an accepted subscribe request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    /// The symbol was newly added.
    Added,
    /// The symbol was already desired; nothing changed.
    AlreadyPresent,
}

/// Default maximum number of desired symbols.
pub const DEFAULT_MAX_SUBSCRIPTIONS: usize = 20;

// =============================================================================
// Registry
// =============================================================================

/// Thread-safe, capacity-bounded desired set.
///
/// # Example
///
/// ```rust
/// use kis_tick_bridge::domain::subscription::{intent, IntentEvent, SubscriptionRegistry, Symbol};
///
/// let (publisher, mut receiver) = intent::channel(16);
/// let registry = SubscriptionRegistry::new(2, publisher);
///
/// registry.add("005930").unwrap();
/// registry.add(" 000660 ").unwrap();
/// assert!(registry.add("035720").is_err());
///
/// registry.remove(["005930"]);
/// assert_eq!(registry.sorted(), vec![Symbol::parse("000660").unwrap()]);
///
/// let events = receiver.drain_all();
/// assert_eq!(events.len(), 3);
/// assert!(matches!(events[2], IntentEvent::Unsubscribe(_)));
/// ```
#[derive(Debug)]
pub struct SubscriptionRegistry {
    desired: Mutex<BTreeSet<Symbol>>,
    capacity: usize,
    intents: IntentPublisher,
}

impl SubscriptionRegistry {
    /// Create an empty registry that publishes changes to `intents`.
    #[must_use]
    pub const fn new(capacity: usize, intents: IntentPublisher) -> Self {
        Self {
            desired: Mutex::new(BTreeSet::new()),
            capacity,
            intents,
        }
    }

    /// Add a symbol to the desired set.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSymbol` for blank input and `AtCapacity` when the set
    /// is full. A rejected add leaves the set untouched.
    pub fn add(&self, raw: &str) -> Result<SubscribeOutcome, SubscriptionError> {
        let symbol = Symbol::parse(raw)?;
        let mut desired = self.desired.lock();

        if desired.contains(&symbol) {
            return Ok(SubscribeOutcome::AlreadyPresent);
        }
        if desired.len() >= self.capacity {
            return Err(SubscriptionError::AtCapacity { max: self.capacity });
        }

        desired.insert(symbol.clone());
        self.intents.publish(IntentEvent::Subscribe(symbol));
        Ok(SubscribeOutcome::Added)
    }

    /// Remove symbols from the desired set.
    ///
    /// Blank and absent symbols are ignored. Returns the symbols that were
    /// actually removed, in input order.
    pub fn remove<I, S>(&self, raws: I) -> Vec<Symbol>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut desired = self.desired.lock();
        let mut removed = Vec::new();

        for raw in raws {
            let Ok(symbol) = Symbol::parse(raw.as_ref()) else {
                continue;
            };
            if desired.remove(&symbol) {
                self.intents.publish(IntentEvent::Unsubscribe(symbol.clone()));
                removed.push(symbol);
            }
        }

        removed
    }

    /// Point-in-time copy of the desired set.
    #[must_use]
    pub fn snapshot(&self) -> BTreeSet<Symbol> {
        self.desired.lock().clone()
    }

    /// Desired symbols in sorted order.
    #[must_use]
    pub fn sorted(&self) -> Vec<Symbol> {
        self.desired.lock().iter().cloned().collect()
    }

    /// Check whether a symbol is currently desired.
    #[must_use]
    pub fn contains(&self, symbol: &str) -> bool {
        self.desired.lock().contains(symbol)
    }

    /// Number of desired symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.desired.lock().len()
    }

    /// Check if nothing is desired.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.desired.lock().is_empty()
    }

    /// Configured maximum.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(capacity: usize) -> (SubscriptionRegistry, IntentReceiver) {
        let (tx, rx) = intent::channel(64);
        (SubscriptionRegistry::new(capacity, tx), rx)
    }

    fn sym(s: &str) -> Symbol {
        Symbol::parse(s).unwrap()
    }

    #[test]
    fn symbol_is_trimmed() {
        assert_eq!(Symbol::parse("  005930\t").unwrap().as_str(), "005930");
    }

    #[test]
    fn blank_symbol_rejected() {
        assert_eq!(Symbol::parse("   "), Err(SymbolError::Empty));
        assert_eq!(Symbol::parse(""), Err(SymbolError::Empty));
    }

    #[test]
    fn symbol_serializes_as_plain_string() {
        assert_eq!(serde_json::to_string(&sym("005930")).unwrap(), "\"005930\"");
    }

    #[test]
    fn symbol_deserializes_through_parse() {
        let parsed: Symbol = serde_json::from_str("\" 005930 \"").unwrap();
        assert_eq!(parsed, sym("005930"));

        let round_trip: Symbol =
            serde_json::from_str(&serde_json::to_string(&sym("000660")).unwrap()).unwrap();
        assert_eq!(round_trip, sym("000660"));

        assert!(serde_json::from_str::<Symbol>("\"  \"").is_err());
    }

    #[test]
    fn add_new_symbol_publishes_intent() {
        let (registry, mut rx) = registry(5);

        assert_eq!(registry.add("005930"), Ok(SubscribeOutcome::Added));
        assert!(registry.contains("005930"));
        assert_eq!(rx.drain_all(), vec![IntentEvent::Subscribe(sym("005930"))]);
    }

    #[test]
    fn add_existing_symbol_is_idempotent() {
        let (registry, mut rx) = registry(1);

        registry.add("005930").unwrap();
        rx.drain_all();

        assert_eq!(registry.add(" 005930 "), Ok(SubscribeOutcome::AlreadyPresent));
        assert_eq!(registry.len(), 1);
        assert!(rx.drain_all().is_empty());
    }

    #[test]
    fn add_blank_symbol_rejected() {
        let (registry, mut rx) = registry(5);

        assert_eq!(
            registry.add("  "),
            Err(SubscriptionError::InvalidSymbol(SymbolError::Empty))
        );
        assert!(registry.is_empty());
        assert!(rx.drain_all().is_empty());
    }

    #[test]
    fn add_at_capacity_rejected_without_mutation() {
        let (registry, mut rx) = registry(2);

        registry.add("A").unwrap();
        registry.add("B").unwrap();
        rx.drain_all();

        assert_eq!(
            registry.add("C"),
            Err(SubscriptionError::AtCapacity { max: 2 })
        );
        assert_eq!(registry.sorted(), vec![sym("A"), sym("B")]);
        assert!(rx.drain_all().is_empty());
    }

    #[test]
    fn remove_absent_symbol_is_noop() {
        let (registry, mut rx) = registry(5);

        registry.add("A").unwrap();
        rx.drain_all();

        assert!(registry.remove(["Z"]).is_empty());
        assert_eq!(registry.len(), 1);
        assert!(rx.drain_all().is_empty());
    }

    #[test]
    fn remove_many_publishes_for_each_removed() {
        let (registry, mut rx) = registry(5);

        registry.add("A").unwrap();
        registry.add("B").unwrap();
        registry.add("C").unwrap();
        rx.drain_all();

        let removed = registry.remove(["C", " ", "A", "missing"]);

        assert_eq!(removed, vec![sym("C"), sym("A")]);
        assert_eq!(registry.sorted(), vec![sym("B")]);
        assert_eq!(
            rx.drain_all(),
            vec![
                IntentEvent::Unsubscribe(sym("C")),
                IntentEvent::Unsubscribe(sym("A")),
            ]
        );
    }

    #[test]
    fn snapshot_is_a_copy() {
        let (registry, _rx) = registry(5);

        registry.add("A").unwrap();
        let snapshot = registry.snapshot();
        registry.add("B").unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn sorted_is_deterministic() {
        let (registry, _rx) = registry(5);

        registry.add("035720").unwrap();
        registry.add("000660").unwrap();
        registry.add("005930").unwrap();

        assert_eq!(
            registry.sorted(),
            vec![sym("000660"), sym("005930"), sym("035720")]
        );
    }

    #[test]
    fn removed_slot_frees_capacity() {
        let (registry, _rx) = registry(1);

        registry.add("A").unwrap();
        registry.remove(["A"]);

        assert_eq!(registry.add("B"), Ok(SubscribeOutcome::Added));
    }

    #[test]
    fn thread_safety_concurrent_adds_respect_capacity() {
        use std::sync::Arc;
        use std::thread;

        let (tx, mut rx) = intent::channel(256);
        let registry = Arc::new(SubscriptionRegistry::new(20, tx));
        let mut handles = vec![];

        for i in 0..50 {
            let r = Arc::clone(&registry);
            handles.push(thread::spawn(move || r.add(&format!("SYM{i}")).is_ok()));
        }

        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(accepted, 20);
        assert_eq!(registry.len(), 20);
        assert_eq!(rx.drain_all().len(), 20);
    }

    #[test]
    fn thread_safety_concurrent_removes() {
        use std::sync::Arc;
        use std::thread;

        let (tx, mut rx) = intent::channel(256);
        let registry = Arc::new(SubscriptionRegistry::new(20, tx));
        for i in 0..10 {
            registry.add(&format!("SYM{i}")).unwrap();
        }
        rx.drain_all();

        let mut handles = vec![];
        for _ in 0..4 {
            let r = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                let codes: Vec<String> = (0..10).map(|i| format!("SYM{i}")).collect();
                r.remove(&codes).len()
            }));
        }

        let removed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        // Each symbol is removed exactly once across all threads
        assert_eq!(removed, 10);
        assert!(registry.is_empty());
        assert_eq!(rx.drain_all().len(), 10);
    }
}

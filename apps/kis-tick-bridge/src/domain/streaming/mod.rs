//! Market Data Streaming Types
//!
//! Core domain types for the upstream tick stream: the decoded tick record,
//! the per-connection remote subscription bookkeeping, and the observable
//! connection state.

pub mod remote;
pub mod state;

use serde::Serialize;

use crate::domain::subscription::Symbol;

pub use remote::{RemoteCommand, RemoteSubscriptions};
pub use state::{ConnectionState, FeedSnapshot, FeedState};

/// One real-time trade tick.
///
/// Prices are kept as the exact text the feed sent so nothing is lost in
/// re-formatting. Serializes to the downstream payload shape
/// `{"code","currentPrice","priceChange","changeRate"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tick {
    /// Stock code.
    #[serde(rename = "code")]
    pub symbol: Symbol,
    /// Last traded price.
    pub current_price: String,
    /// Change versus previous close.
    pub price_change: String,
    /// Change rate versus previous close, in percent.
    pub change_rate: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_serializes_to_forward_payload() {
        let tick = Tick {
            symbol: Symbol::parse("005930").unwrap(),
            current_price: "70000".to_string(),
            price_change: "100".to_string(),
            change_rate: "0.14".to_string(),
        };

        let value = serde_json::to_value(&tick).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "code": "005930",
                "currentPrice": "70000",
                "priceChange": "100",
                "changeRate": "0.14",
            })
        );
    }
}

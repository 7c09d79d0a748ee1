//! Stream Codec Module
//!
//! Decoding of inbound KIS frames and encoding of registration requests.
//!
//! # Data Frame Format
//!
//! ```text
//! 0|H0STCNT0|001|005930^093000^70000^2^100^0.14^...
//! │ │        │   └─ caret-separated record fields
//! │ │        └─ record count
//! │ └─ feed type (tr_id)
//! └─ 0 = plain, 1 = encrypted
//! ```
//!
//! Field 0 is the stock code, field 2 the current price, field 4 the change
//! and field 5 the change rate. Frames that start with `{` are JSON control
//! responses.

use super::messages::{ControlResponse, SubscriptionRequest, TrType};
use crate::domain::streaming::Tick;
use crate::domain::subscription::Symbol;

const SYMBOL_FIELD: usize = 0;
const PRICE_FIELD: usize = 2;
const CHANGE_FIELD: usize = 4;
const RATE_FIELD: usize = 5;
const MIN_FIELDS: usize = RATE_FIELD + 1;

/// Codec errors. None of these are fatal to the connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Data frame had fewer than four `|` sections.
    #[error("expected at least 4 sections, got {0}")]
    MissingSections(usize),

    /// Record had fewer fields than needed.
    #[error("expected at least {MIN_FIELDS} fields, got {0}")]
    MissingFields(usize),

    /// Record had a blank stock code.
    #[error("record has an empty stock code")]
    EmptySymbol,

    /// JSON control frame did not parse.
    #[error("invalid control frame: {0}")]
    InvalidControl(String),

    /// Encoding a request failed.
    #[error("failed to encode request: {0}")]
    Encode(String),
}

/// One decoded inbound frame.
#[derive(Debug, Clone)]
pub enum InboundFrame {
    /// Records from a data frame of the configured feed.
    ///
    /// In a batched frame a bad record is reported in `rejected` and the
    /// other records are still decoded.
    Ticks {
        /// Decoded records, in frame order.
        ticks: Vec<Tick>,
        /// Why each skipped record was rejected.
        rejected: Vec<CodecError>,
    },
    /// JSON control frame (ack, rejection, or heartbeat).
    Control(ControlResponse),
    /// Frame for a different feed, encrypted, or otherwise not ours.
    Ignored,
}

/// Codec bound to one feed type.
#[derive(Debug, Clone)]
pub struct KisCodec {
    tr_id: String,
    record_width: usize,
}

impl KisCodec {
    /// Create a codec for `tr_id` whose records are `record_width` fields wide.
    #[must_use]
    pub fn new(tr_id: impl Into<String>, record_width: usize) -> Self {
        Self {
            tr_id: tr_id.into(),
            record_width,
        }
    }

    /// Feed type this codec decodes and subscribes to.
    #[must_use]
    pub fn tr_id(&self) -> &str {
        &self.tr_id
    }

    /// Decode one inbound payload.
    ///
    /// # Errors
    ///
    /// Returns `CodecError` for malformed frames. Callers log and discard.
    pub fn decode(&self, text: &str) -> Result<InboundFrame, CodecError> {
        if text.starts_with('{') {
            return serde_json::from_str::<ControlResponse>(text)
                .map(InboundFrame::Control)
                .map_err(|e| CodecError::InvalidControl(e.to_string()));
        }

        if !text.starts_with('0') {
            return Ok(InboundFrame::Ignored);
        }

        let sections: Vec<&str> = text.splitn(4, '|').collect();
        if sections.len() < 4 {
            return Err(CodecError::MissingSections(sections.len()));
        }
        if sections[0] != "0" || sections[1] != self.tr_id {
            return Ok(InboundFrame::Ignored);
        }

        let fields: Vec<&str> = sections[3].split('^').collect();
        let count = sections[2].trim().parse::<usize>().unwrap_or(1);

        if count <= 1 || fields.len() < count * self.record_width {
            return Ok(InboundFrame::Ticks {
                ticks: vec![decode_record(&fields)?],
                rejected: Vec::new(),
            });
        }

        let mut ticks = Vec::with_capacity(count);
        let mut rejected = Vec::new();
        for record in fields.chunks(self.record_width).take(count) {
            match decode_record(record) {
                Ok(tick) => ticks.push(tick),
                Err(e) => rejected.push(e),
            }
        }

        Ok(InboundFrame::Ticks { ticks, rejected })
    }

    /// Encode a registration request for `symbol`.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Encode` if serialization fails.
    pub fn encode_request(
        &self,
        approval_key: &str,
        custtype: &str,
        tr_type: TrType,
        symbol: &Symbol,
    ) -> Result<String, CodecError> {
        SubscriptionRequest::new(approval_key, custtype, tr_type, &self.tr_id, symbol.as_str())
            .to_json()
            .map_err(|e| CodecError::Encode(e.to_string()))
    }
}

fn decode_record(fields: &[&str]) -> Result<Tick, CodecError> {
    if fields.len() < MIN_FIELDS {
        return Err(CodecError::MissingFields(fields.len()));
    }

    let symbol = Symbol::parse(fields[SYMBOL_FIELD]).map_err(|_| CodecError::EmptySymbol)?;

    Ok(Tick {
        symbol,
        current_price: fields[PRICE_FIELD].to_string(),
        price_change: fields[CHANGE_FIELD].to_string(),
        change_rate: fields[RATE_FIELD].to_string(),
    })
}

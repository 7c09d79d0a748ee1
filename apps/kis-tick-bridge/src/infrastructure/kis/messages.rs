//! KIS WebSocket Message Types
//!
//! Outbound subscription requests and inbound JSON control responses for the
//! KIS real-time stream.
//!
//! # Subscribe Request
//!
//! ```json
//! {"header":{"approval_key":"...","custtype":"P","tr_type":"1","content-type":"utf-8"},
//!  "body":{"input":{"tr_id":"H0STCNT0","tr_key":"005930"}}}
//! ```
//!
//! `tr_type` is `"1"` to register and `"2"` to release.
//!
//! # Control Response
//!
//! ```json
//! {"header":{"tr_id":"H0STCNT0","tr_key":"005930","encrypt":"N"},
//!  "body":{"rt_cd":"0","msg_cd":"OPSP0000","msg1":"SUBSCRIBE SUCCESS"}}
//! ```
//!
//! Heartbeats arrive as a control response whose `tr_id` is `PINGPONG` and
//! must be echoed back verbatim.

use serde::{Deserialize, Serialize};

/// Domestic stock real-time trade feed.
pub const DEFAULT_TR_ID: &str = "H0STCNT0";

/// Heartbeat transaction id.
pub const PINGPONG_TR_ID: &str = "PINGPONG";

/// Number of caret-separated fields in one `H0STCNT0` record.
pub const H0STCNT0_RECORD_WIDTH: usize = 46;

// =============================================================================
// Outbound
// =============================================================================

/// Registration direction carried in `tr_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrType {
    /// Register a key.
    #[serde(rename = "1")]
    Subscribe,
    /// Release a key.
    #[serde(rename = "2")]
    Unsubscribe,
}

/// Header of a registration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestHeader {
    /// WebSocket approval key.
    pub approval_key: String,
    /// Customer type (`P` personal, `B` business).
    pub custtype: String,
    /// Register or release.
    pub tr_type: TrType,
    /// Payload encoding.
    #[serde(rename = "content-type")]
    pub content_type: String,
}

/// Feed and key being registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestInput {
    /// Feed type.
    pub tr_id: String,
    /// Stock code.
    pub tr_key: String,
}

/// Body of a registration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestBody {
    /// Registration input.
    pub input: RequestInput,
}

/// A complete registration request frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    /// Credential and direction.
    pub header: RequestHeader,
    /// Feed and key.
    pub body: RequestBody,
}

impl SubscriptionRequest {
    /// Build a request.
    #[must_use]
    pub fn new(
        approval_key: &str,
        custtype: &str,
        tr_type: TrType,
        tr_id: &str,
        tr_key: &str,
    ) -> Self {
        Self {
            header: RequestHeader {
                approval_key: approval_key.to_string(),
                custtype: custtype.to_string(),
                tr_type,
                content_type: "utf-8".to_string(),
            },
            body: RequestBody {
                input: RequestInput {
                    tr_id: tr_id.to_string(),
                    tr_key: tr_key.to_string(),
                },
            },
        }
    }

    /// Serialize to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// Inbound
// =============================================================================

/// Header of a JSON control frame.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseHeader {
    /// Transaction id (`PINGPONG` for heartbeats).
    #[serde(default)]
    pub tr_id: String,
    /// Key the response refers to.
    #[serde(default)]
    pub tr_key: String,
}

/// Body of a JSON control frame.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseBody {
    /// `"0"` on success.
    #[serde(default)]
    pub rt_cd: String,
    /// Message code.
    #[serde(default)]
    pub msg_cd: String,
    /// Human-readable message.
    #[serde(default)]
    pub msg1: String,
}

/// A JSON control frame from the server.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlResponse {
    /// Header.
    pub header: ResponseHeader,
    /// Body (absent on heartbeats).
    #[serde(default)]
    pub body: Option<ResponseBody>,
}

impl ControlResponse {
    /// Check if this frame is a heartbeat.
    #[must_use]
    pub fn is_pingpong(&self) -> bool {
        self.header.tr_id == PINGPONG_TR_ID
    }

    /// Check if the server accepted the request. Heartbeats count as success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.body.as_ref().is_none_or(|b| b.rt_cd == "0")
    }
}

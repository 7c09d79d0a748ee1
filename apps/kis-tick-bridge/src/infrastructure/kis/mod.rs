//! KIS WebSocket Adapters
//!
//! Real-time stream client for the Korea Investment & Securities domestic
//! stock feed: wire messages, frame codec, the `tokio-tungstenite`
//! connection, backoff policy and the connection manager loop.

pub mod auth;
pub mod codec;
pub mod connection;
pub mod messages;
pub mod reconnect;
pub mod stream;

pub use auth::{AuthError, CustType};
pub use codec::{CodecError, InboundFrame, KisCodec};
pub use connection::{KisConnector, WsConnection};
pub use messages::{ControlResponse, DEFAULT_TR_ID, SubscriptionRequest, TrType};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use stream::{StreamConfig, StreamConnectionManager};

//! WebSocket Connection Adapter
//!
//! `tokio-tungstenite` implementation of the [`FeedConnector`] and
//! [`FeedConnection`] ports.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::application::ports::{FeedConnection, FeedConnector, StreamError};

/// Opens WebSocket connections to a fixed URL.
#[derive(Debug, Clone)]
pub struct KisConnector {
    url: String,
}

impl KisConnector {
    /// Create a connector for `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl FeedConnector for KisConnector {
    async fn connect(&self) -> Result<Box<dyn FeedConnection>, StreamError> {
        tracing::info!(url = %self.url, "Connecting to KIS stream");

        let (stream, _response) = tokio_tungstenite::connect_async(&self.url)
            .await
            .map_err(|e| StreamError::Connect(e.to_string()))?;

        Ok(Box::new(WsConnection { stream }))
    }
}

/// An open WebSocket connection.
pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FeedConnection for WsConnection {
    async fn send_text(&mut self, text: String) -> Result<(), StreamError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| StreamError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> Result<String, StreamError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.to_string()),
                Some(Ok(Message::Binary(data))) => {
                    return Ok(String::from_utf8_lossy(&data).into_owned());
                }
                Some(Ok(Message::Ping(data))) => {
                    self.stream
                        .send(Message::Pong(data))
                        .await
                        .map_err(|e| StreamError::Send(e.to_string()))?;
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(frame = ?frame, "Server sent close frame");
                    return Err(StreamError::ConnectionClosed);
                }
                Some(Ok(_)) => {
                    // Pong and raw frames carry nothing for us
                }
                Some(Err(e)) => return Err(StreamError::Receive(e.to_string())),
                None => {
                    tracing::info!("WebSocket stream ended");
                    return Err(StreamError::ConnectionClosed);
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!(error = %e, "WebSocket close failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_to_closed_port_fails_with_connect_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let connector = KisConnector::new(format!("ws://{addr}"));
        let err = connector.connect().await.err().unwrap();

        assert_eq!(err.kind(), "connect");
    }
}

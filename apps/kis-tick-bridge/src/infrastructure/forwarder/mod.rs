//! HTTP Tick Sink
//!
//! Posts each accepted tick as JSON to the downstream service:
//!
//! ```json
//! {"code":"005930","currentPrice":"70000","priceChange":"100","changeRate":"0.14"}
//! ```
//!
//! The response body is ignored; any non-2xx status is a failure.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::application::ports::{ForwardError, TickSink};
use crate::domain::streaming::Tick;
use crate::infrastructure::config::ForwarderSettings;

/// [`TickSink`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTickSink {
    client: Client,
    url: String,
}

impl HttpTickSink {
    /// Create a sink posting to `url` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `ForwardError::Network` if the client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ForwardError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ForwardError::Network(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Create a sink from `ForwarderSettings`.
    ///
    /// # Errors
    ///
    /// Returns `ForwardError::Network` if the client cannot be built.
    pub fn from_settings(settings: &ForwarderSettings) -> Result<Self, ForwardError> {
        Self::new(settings.url.clone(), settings.timeout)
    }
}

#[async_trait]
impl TickSink for HttpTickSink {
    async fn forward(&self, tick: &Tick) -> Result<(), ForwardError> {
        let response = self
            .client
            .post(&self.url)
            .json(tick)
            .send()
            .await
            .map_err(|e| ForwardError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ForwardError::Status(status.as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::subscription::Symbol;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tick() -> Tick {
        Tick {
            symbol: Symbol::parse("005930").unwrap(),
            current_price: "70000".to_string(),
            price_change: "100".to_string(),
            change_rate: "0.14".to_string(),
        }
    }

    #[tokio::test]
    async fn posts_tick_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/stocks/realtime"))
            .and(body_json(serde_json::json!({
                "code": "005930",
                "currentPrice": "70000",
                "priceChange": "100",
                "changeRate": "0.14",
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let sink = HttpTickSink::new(
            format!("{}/api/stocks/realtime", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap();

        sink.forward(&tick()).await.unwrap();
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let sink = HttpTickSink::new(server.uri(), Duration::from_secs(5)).unwrap();

        assert_eq!(
            sink.forward(&tick()).await.unwrap_err(),
            ForwardError::Status(503)
        );
    }

    #[tokio::test]
    async fn slow_sink_times_out_as_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let sink = HttpTickSink::new(server.uri(), Duration::from_millis(100)).unwrap();

        assert!(matches!(
            sink.forward(&tick()).await,
            Err(ForwardError::Network(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_sink_is_a_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let sink = HttpTickSink::new(format!("http://{addr}/"), Duration::from_secs(1)).unwrap();

        assert!(matches!(
            sink.forward(&tick()).await,
            Err(ForwardError::Network(_))
        ));
    }

    #[tokio::test]
    async fn from_settings_posts_to_configured_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ticks"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let settings = ForwarderSettings {
            url: format!("{}/ticks", server.uri()),
            ..ForwarderSettings::default()
        };
        let sink = HttpTickSink::from_settings(&settings).unwrap();

        assert!(sink.forward(&tick()).await.is_ok());
    }
}

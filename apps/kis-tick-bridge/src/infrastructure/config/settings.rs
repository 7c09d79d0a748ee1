//! Bridge Configuration Settings
//!
//! Configuration types for the tick bridge, loaded from environment variables.

use std::time::Duration;

use crate::application::services::DEFAULT_FORWARD_QUEUE_CAPACITY;
use crate::domain::subscription::DEFAULT_MAX_SUBSCRIPTIONS;
use crate::domain::subscription::intent::DEFAULT_INTENT_CAPACITY;
use crate::infrastructure::kis::auth::{AuthError, CustType};
use crate::infrastructure::kis::messages::DEFAULT_TR_ID;

pub use crate::infrastructure::kis::auth::Credentials;

/// KIS environment (mock trading vs real trading).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Mock trading server.
    #[default]
    Paper,
    /// Real trading server.
    Live,
}

impl Environment {
    /// Parse environment from string.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "LIVE" | "REAL" => Self::Live,
            _ => Self::Paper,
        }
    }

    /// Check if this is the live environment.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }

    /// Get the environment name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Paper => "paper",
            Self::Live => "live",
        }
    }

    /// Default real-time WebSocket URL.
    #[must_use]
    pub const fn stream_url(&self) -> &'static str {
        match self {
            Self::Paper => "ws://ops.koreainvestment.com:31000",
            Self::Live => "ws://ops.koreainvestment.com:21000",
        }
    }
}

/// Upstream stream settings.
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    /// WebSocket URL.
    pub url: String,
    /// Approval key and customer type.
    pub credentials: Credentials,
    /// Feed type subscribed to.
    pub tr_id: String,
    /// Longest single wait for an inbound frame.
    pub receive_timeout: Duration,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Jitter fraction applied to each delay (0 disables).
    pub reconnect_jitter: f64,
}

impl UpstreamSettings {
    /// Settings with defaults for everything but the credentials.
    #[must_use]
    pub fn new(url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            url: url.into(),
            credentials,
            tr_id: DEFAULT_TR_ID.to_string(),
            receive_timeout: Duration::from_millis(1000),
            reconnect_delay_initial: Duration::from_millis(1000),
            reconnect_delay_max: Duration::from_secs(10),
            reconnect_delay_multiplier: 2.0,
            reconnect_jitter: 0.0,
        }
    }
}

/// Subscription control settings.
#[derive(Debug, Clone)]
pub struct SubscriptionSettings {
    /// Largest allowed desired set.
    pub max_subscriptions: usize,
    /// Bound of the intent channel.
    pub intent_capacity: usize,
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            max_subscriptions: DEFAULT_MAX_SUBSCRIPTIONS,
            intent_capacity: DEFAULT_INTENT_CAPACITY,
        }
    }
}

/// Downstream forwarding settings.
#[derive(Debug, Clone)]
pub struct ForwarderSettings {
    /// Endpoint receiving tick POSTs.
    pub url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Bound of the queue feeding the forwarder.
    pub queue_capacity: usize,
}

impl Default for ForwarderSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:8484/api/stocks/realtime".to_string(),
            timeout: Duration::from_secs(5),
            queue_capacity: DEFAULT_FORWARD_QUEUE_CAPACITY,
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Control, health and metrics HTTP port.
    pub http_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { http_port: 5000 }
    }
}

/// Logging and trace export settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetrySettings {
    /// Export spans over OTLP.
    pub otlp_enabled: bool,
    /// OTLP collector endpoint.
    pub otlp_endpoint: String,
    /// Service name attached to exported spans.
    pub service_name: String,
    /// Extra `EnvFilter` directives (`RUST_LOG`).
    pub log_filter: Option<String>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            otlp_enabled: true,
            otlp_endpoint: "http://localhost:4318".to_string(),
            service_name: "kis-tick-bridge".to_string(),
            log_filter: None,
        }
    }
}

impl TelemetrySettings {
    /// Read the `OTEL_*` and `RUST_LOG` keys. Never fails.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            otlp_enabled: lookup("OTEL_ENABLED")
                .is_none_or(|v| !v.trim().eq_ignore_ascii_case("false")),
            otlp_endpoint: non_blank(&lookup, "OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or(defaults.otlp_endpoint),
            service_name: non_blank(&lookup, "OTEL_SERVICE_NAME").unwrap_or(defaults.service_name),
            log_filter: non_blank(&lookup, "RUST_LOG"),
        }
    }
}

/// Complete bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// KIS environment.
    pub environment: Environment,
    /// Upstream stream settings.
    pub upstream: UpstreamSettings,
    /// Subscription control settings.
    pub subscriptions: SubscriptionSettings,
    /// Downstream forwarding settings.
    pub forwarder: ForwarderSettings,
    /// Server port settings.
    pub server: ServerSettings,
    /// Logging and trace export settings.
    pub telemetry: TelemetrySettings,
}

impl BridgeConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if required values are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let approval_key = lookup("KIS_APPROVAL_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("KIS_APPROVAL_KEY".to_string()))?;

        if approval_key.trim().is_empty() {
            return Err(ConfigError::EmptyValue("KIS_APPROVAL_KEY".to_string()));
        }

        let custtype = match lookup("KIS_CUSTTYPE") {
            Some(raw) => raw.parse::<CustType>()?,
            None => CustType::default(),
        };

        let environment = lookup("KIS_ENV")
            .map(|s| Environment::from_str_case_insensitive(&s))
            .unwrap_or_default();

        let url = lookup("KIS_WS_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| environment.stream_url().to_string());

        let defaults = UpstreamSettings::new(url, Credentials::new(approval_key, custtype)?);

        let upstream = UpstreamSettings {
            tr_id: lookup("KIS_TR_ID")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| defaults.tr_id.clone()),
            receive_timeout: parse_duration_millis(
                &lookup,
                "BRIDGE_RECEIVE_TIMEOUT_MS",
                defaults.receive_timeout,
            ),
            reconnect_delay_initial: parse_duration_millis(
                &lookup,
                "BRIDGE_RECONNECT_DELAY_INITIAL_MS",
                defaults.reconnect_delay_initial,
            ),
            reconnect_delay_max: parse_duration_secs(
                &lookup,
                "BRIDGE_RECONNECT_DELAY_MAX_SECS",
                defaults.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: parse_or(
                &lookup,
                "BRIDGE_RECONNECT_DELAY_MULTIPLIER",
                defaults.reconnect_delay_multiplier,
            ),
            reconnect_jitter: parse_or(
                &lookup,
                "BRIDGE_RECONNECT_JITTER",
                defaults.reconnect_jitter,
            ),
            ..defaults
        };

        let subscriptions = SubscriptionSettings {
            max_subscriptions: parse_or(
                &lookup,
                "BRIDGE_MAX_SUBSCRIPTIONS",
                SubscriptionSettings::default().max_subscriptions,
            ),
            intent_capacity: parse_or(
                &lookup,
                "BRIDGE_INTENT_CAPACITY",
                SubscriptionSettings::default().intent_capacity,
            ),
        };

        let forwarder = ForwarderSettings {
            url: lookup("FORWARD_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| ForwarderSettings::default().url),
            timeout: parse_duration_secs(
                &lookup,
                "FORWARD_TIMEOUT_SECS",
                ForwarderSettings::default().timeout,
            ),
            queue_capacity: parse_or(
                &lookup,
                "BRIDGE_FORWARD_QUEUE_CAPACITY",
                ForwarderSettings::default().queue_capacity,
            ),
        };

        let server = ServerSettings {
            http_port: parse_or(&lookup, "BRIDGE_HTTP_PORT", ServerSettings::default().http_port),
        };

        Ok(Self {
            environment,
            upstream,
            subscriptions,
            forwarder,
            server,
            telemetry: TelemetrySettings::from_lookup(&lookup),
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Credential value was rejected.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(#[from] AuthError),
}

fn non_blank<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.trim().is_empty())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_duration_secs<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_duration_millis<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

//! Configuration Module
//!
//! Configuration loading for the bridge service.

mod settings;

pub use settings::{
    BridgeConfig, ConfigError, Credentials, Environment, ForwarderSettings, ServerSettings,
    SubscriptionSettings, TelemetrySettings, UpstreamSettings,
};

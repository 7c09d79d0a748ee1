//! Logging and Trace Export
//!
//! Installs the global `tracing` subscriber: a fmt layer filtered by the
//! bridge's default directives plus any `RUST_LOG` override, and, when
//! enabled, an OTLP span exporter.
//!
//! Settings come from [`TelemetrySettings`], loaded with the rest of
//! `BridgeConfig`. A broken OTLP setup never stops the bridge; it falls back
//! to console logging.
//!
//! ```ignore
//! let config = BridgeConfig::from_env()?;
//! let _guard = telemetry::init(&config.telemetry);
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::infrastructure::config::TelemetrySettings;

/// Directives applied before any `RUST_LOG` override.
///
/// The bridge logs at `info`; the WebSocket and HTTP client stacks are noisy
/// below `warn`.
pub const DEFAULT_DIRECTIVES: [&str; 5] = [
    "kis_tick_bridge=info",
    "tungstenite=warn",
    "reqwest=warn",
    "h2=warn",
    "hyper=warn",
];

/// Telemetry setup failures.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The OTLP span exporter could not be built.
    #[error("failed to build OTLP exporter for {endpoint}: {message}")]
    Exporter {
        /// Configured endpoint.
        endpoint: String,
        /// Exporter error text.
        message: String,
    },
}

/// Flushes and shuts down the tracer provider when dropped.
pub struct TelemetryGuard {
    tracer_provider: Option<SdkTracerProvider>,
}

impl TelemetryGuard {
    /// Whether spans are exported over OTLP.
    #[must_use]
    pub const fn is_exporting(&self) -> bool {
        self.tracer_provider.is_some()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("Failed to shut down tracer provider: {e}");
        }
    }
}

/// Build the log filter: defaults first, then `log_filter` directives.
///
/// Unparseable override directives are skipped.
#[must_use]
pub fn build_env_filter(log_filter: Option<&str>) -> EnvFilter {
    let overrides = log_filter
        .into_iter()
        .flat_map(|filter| filter.split(','))
        .map(str::trim)
        .filter(|directive| !directive.is_empty());

    DEFAULT_DIRECTIVES
        .into_iter()
        .chain(overrides)
        .filter_map(|directive| directive.parse().ok())
        .fold(EnvFilter::new("info"), EnvFilter::add_directive)
}

/// Build the OTLP tracer provider, or `None` when export is disabled.
///
/// # Errors
///
/// Returns `TelemetryError::Exporter` if the exporter cannot be built.
pub fn build_tracer_provider(
    settings: &TelemetrySettings,
) -> Result<Option<SdkTracerProvider>, TelemetryError> {
    if !settings.otlp_enabled {
        return Ok(None);
    }

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&settings.otlp_endpoint)
        .build()
        .map_err(|e| TelemetryError::Exporter {
            endpoint: settings.otlp_endpoint.clone(),
            message: e.to_string(),
        })?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            Resource::builder()
                .with_service_name(settings.service_name.clone())
                .build(),
        )
        .build();

    Ok(Some(provider))
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for the life of the process.
#[must_use]
pub fn init(settings: &TelemetrySettings) -> TelemetryGuard {
    let env_filter = build_env_filter(settings.log_filter.as_deref());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false);

    let (tracer_provider, export_error) = match build_tracer_provider(settings) {
        Ok(provider) => (provider, None),
        Err(e) => (None, Some(e)),
    };

    let otel_layer = tracer_provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(settings.service_name.clone()))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .init();

    if let Some(e) = export_error {
        tracing::warn!(error = %e, "OTLP export disabled, logging to console only");
    } else if tracer_provider.is_some() {
        tracing::debug!(
            endpoint = %settings.otlp_endpoint,
            service = %settings.service_name,
            "OTLP span export enabled"
        );
    }

    TelemetryGuard { tracer_provider }
}

//! OpenTelemetry tracing with Google Cloud Trace export.
//!
//! Only available with the `otel` feature:
//!
//! ```toml
//! [dependencies]
//! imagegen-mcp-common = { version = "*", features = ["otel"] }
//! ```
//!
//! # Environment Variables
//!
//! - `OTEL_ENABLED`: "true" or "1" enables export (default: disabled)
//! - `GOOGLE_CLOUD_PROJECT` or `PROJECT_ID`: project receiving the traces
//! - `OTEL_SERVICE_NAME`: service name for traces (default: "imagegen-mcp")
//! - `RUST_LOG`: log level filtering, same as standard tracing

use opentelemetry_gcloud_trace::GcpCloudTraceExporterBuilder;
use thiserror::Error;
use tracing_subscriber::prelude::*;

use crate::tracing::{DEFAULT_LOG_LEVEL, env_filter, fmt_layer};

/// Default service name attached to exported spans.
pub const DEFAULT_SERVICE_NAME: &str = "imagegen-mcp";

/// Errors that can occur during OpenTelemetry initialization.
#[derive(Debug, Error)]
pub enum OtelError {
    /// OpenTelemetry is not enabled via environment variable.
    #[error("OpenTelemetry is not enabled. Set OTEL_ENABLED=true to enable.")]
    NotEnabled,

    /// No project to export traces to.
    #[error("GOOGLE_CLOUD_PROJECT or PROJECT_ID is required for Google Cloud Trace export")]
    MissingProjectId,

    /// Failed to create the Google Cloud Trace exporter.
    #[error("Failed to create Google Cloud Trace exporter: {0}")]
    ExporterCreationFailed(String),

    /// Failed to install the tracer provider.
    #[error("Failed to install tracer provider: {0}")]
    TracerInstallFailed(String),

    /// Failed to set the global subscriber.
    #[error("Failed to set global tracing subscriber: {0}")]
    SubscriberSetFailed(String),
}

/// Configuration for OpenTelemetry tracing.
#[derive(Debug, Clone)]
pub struct OtelConfig {
    /// Whether OpenTelemetry is enabled.
    pub enabled: bool,
    /// Google Cloud project ID for trace export.
    pub project_id: Option<String>,
    /// Service name for traces.
    pub service_name: String,
    /// Default log level when RUST_LOG is not set.
    pub default_log_level: String,
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            project_id: None,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            default_log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl OtelConfig {
    /// Enabled configuration exporting to `project_id`.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            enabled: true,
            project_id: Some(project_id.into()),
            ..Default::default()
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Self {
            enabled: get("OTEL_ENABLED").is_some_and(|v| is_truthy(&v)),
            project_id: get("GOOGLE_CLOUD_PROJECT").or_else(|| get("PROJECT_ID")),
            service_name: get("OTEL_SERVICE_NAME")
                .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),
            default_log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }

    /// Set the service name.
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Set the default log level.
    pub fn with_default_log_level(mut self, level: impl Into<String>) -> Self {
        self.default_log_level = level.into();
        self
    }

    /// Enable or disable OpenTelemetry.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1")
}

/// Shuts the tracer provider down when dropped, flushing pending spans.
pub struct OtelGuard {
    provider: opentelemetry_sdk::trace::SdkTracerProvider,
}

impl Drop for OtelGuard {
    fn drop(&mut self) {
        tracing::debug!("Shutting down OpenTelemetry tracer provider");
        if let Err(e) = self.provider.shutdown() {
            tracing::error!("Failed to shutdown OpenTelemetry tracer provider: {:?}", e);
        }
    }
}

/// Install a subscriber exporting spans to Google Cloud Trace.
///
/// The returned guard must be kept alive for the lifetime of the process.
///
/// # Errors
///
/// Fails when export is disabled, no project is configured, the exporter
/// cannot be created, or a global subscriber is already installed.
pub async fn init_otel_tracing(config: OtelConfig) -> Result<OtelGuard, OtelError> {
    if !config.enabled {
        return Err(OtelError::NotEnabled);
    }

    let project_id = config.project_id.ok_or(OtelError::MissingProjectId)?;

    let exporter = GcpCloudTraceExporterBuilder::new(project_id);

    let provider = exporter
        .create_provider()
        .await
        .map_err(|e| OtelError::ExporterCreationFailed(e.to_string()))?;

    let tracer = exporter
        .install(&provider)
        .await
        .map_err(|e| OtelError::TracerInstallFailed(e.to_string()))?;

    opentelemetry::global::set_tracer_provider(provider.clone());

    tracing_subscriber::registry()
        .with(env_filter(&config.default_log_level))
        .with(fmt_layer())
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .try_init()
        .map_err(|e| OtelError::SubscriberSetFailed(e.to_string()))?;

    tracing::info!(
        service_name = %config.service_name,
        "OpenTelemetry tracing initialized with Google Cloud Trace export"
    );

    Ok(OtelGuard { provider })
}

/// Initialize tracing, exporting to Cloud Trace when enabled.
///
/// Falls back to console-only tracing when export is disabled or fails.
/// Returns the guard when export was set up.
pub async fn init_tracing_with_optional_otel(config: OtelConfig) -> Option<OtelGuard> {
    let default_level = config.default_log_level.clone();
    if !config.enabled {
        crate::tracing::init_tracing_with_default(&default_level);
        tracing::debug!("OpenTelemetry disabled, using standard tracing");
        return None;
    }

    match init_otel_tracing(config).await {
        Ok(guard) => Some(guard),
        Err(e) => {
            crate::tracing::init_tracing_with_default(&default_level);
            tracing::warn!("Failed to initialize OpenTelemetry, using standard tracing: {}", e);
            None
        }
    }
}

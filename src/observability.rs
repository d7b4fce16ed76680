// src/observability.rs
//! Logging and metrics set-up

use crate::utils::config::{LoggingSettings, MetricsSettings};
use crate::utils::errors::{RedirectorError, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over the configured level. Fails if a subscriber is
/// already installed.
pub fn init_tracing(settings: &LoggingSettings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .map_err(|e| RedirectorError::ConfigError(format!("Invalid log filter: {}", e)))?;

    let registry = tracing_subscriber::registry().with(filter);

    let result = if settings.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    };

    result.map_err(|e| RedirectorError::ConfigError(format!("Failed to init tracing: {}", e)))
}

/// Start the Prometheus exporter when enabled
pub fn init_metrics(settings: &MetricsSettings) -> Result<()> {
    if !settings.enabled {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(settings.listen_addr)
        .install()
        .map_err(|e| RedirectorError::ConfigError(format!("Failed to start metrics exporter: {}", e)))?;

    info!("Metrics exporter listening on {}", settings.listen_addr);
    Ok(())
}

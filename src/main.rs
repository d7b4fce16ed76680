// src/main.rs
//! Target Redirector
//!
//! Runs a local HTTP proxy that redirects requests for one endpoint to
//! another, activating the configured rule at start-up and removing it
//! (including any hostname resolution override) on shutdown.

use anyhow::{bail, Result};
use std::sync::Arc;
use target_redirector::interception::{HttpProxy, InterceptorPipeline};
use target_redirector::observability::{init_metrics, init_tracing};
use target_redirector::redirect::{SessionContext, SessionRegistry};
use target_redirector::utils::config::RedirectorConfig;
use target_redirector::BuildInfo;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration before logging so the log level can come from it
    let config = RedirectorConfig::load()?;

    init_tracing(&config.logging)?;
    init_metrics(&config.metrics)?;

    let build = BuildInfo::current();
    info!(
        "Starting Target Redirector v{} ({}, built {})",
        build.version, build.git_hash, build.build_timestamp
    );

    let pipeline = Arc::new(InterceptorPipeline::new());
    let context = SessionContext::from_settings(&config.resolution, pipeline.clone())?;
    let registry = SessionRegistry::new(context);

    match &config.redirect {
        Some(rule) => {
            let active = registry
                .request_toggle(rule.original.clone(), rule.replacement.clone())
                .await;
            if !active {
                bail!("Redirection could not be activated; check the configured endpoints");
            }
        }
        None => warn!("No redirect rule configured; proxying without redirection"),
    }

    let proxy = Arc::new(HttpProxy::new(config.proxy.clone(), pipeline)?);

    let outcome = tokio::select! {
        result = proxy.start() => result,
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!("Failed to listen for CTRL+C: {}", e);
            }
            info!("Received shutdown signal, cleaning up...");
            Ok(())
        }
    };

    registry.shutdown().await;

    match outcome {
        Ok(()) => {
            info!("Proxy stopped gracefully");
            Ok(())
        }
        Err(e) => {
            error!("Proxy error: {}", e);
            Err(e.into())
        }
    }
}

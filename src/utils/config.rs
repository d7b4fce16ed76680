// src/utils/config.rs
//! Redirector configuration
//!
//! Values come from an optional TOML file (path in `REDIRECTOR_CONFIG`,
//! default `redirector.toml`) overlaid by `REDIRECTOR__*` environment
//! variables, e.g. `REDIRECTOR__PROXY__LISTEN_ADDR=0.0.0.0:8080`.

use crate::interception::http_proxy::ProxyConfig;
use crate::redirect::config_store::RESOLUTION_SCOPE;
use crate::redirect::endpoint::EndpointInput;
use crate::redirect::resolver::ResolverKind;
use crate::utils::errors::Result;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "REDIRECTOR_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "redirector.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RedirectorConfig {
    pub proxy: ProxyConfig,
    pub resolution: ResolutionSettings,
    pub logging: LoggingSettings,
    pub metrics: MetricsSettings,

    /// Rule activated at start-up
    pub redirect: Option<RuleSettings>,
}

/// Name resolution and settings-store options
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolutionSettings {
    pub resolver: ResolverKind,

    /// Upper bound on one resolvability probe
    pub probe_timeout_ms: u64,

    /// JSON settings file patched with resolution overrides; in-memory when unset
    pub settings_path: Option<PathBuf>,

    /// Dotted scope of the resolution rule collection
    pub scope: String,

    /// Address unresolvable original hosts are mapped to
    pub loopback: IpAddr,
}

impl ResolutionSettings {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for ResolutionSettings {
    fn default() -> Self {
        Self {
            resolver: ResolverKind::System,
            probe_timeout_ms: 3000,
            settings_path: None,
            scope: RESOLUTION_SCOPE.to_string(),
            loopback: IpAddr::V4(Ipv4Addr::LOCALHOST),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "target_redirector=info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub enabled: bool,
    pub listen_addr: SocketAddr,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 9000)),
        }
    }
}

/// A redirection rule as form values
#[derive(Debug, Clone, Deserialize)]
pub struct RuleSettings {
    pub original: EndpointInput,
    pub replacement: EndpointInput,
}

impl RedirectorConfig {
    /// Load from the file named by `REDIRECTOR_CONFIG` plus the environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    /// Load from `path` (optional) plus the environment
    pub fn load_from(path: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("REDIRECTOR")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

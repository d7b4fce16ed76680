// src/redirect/validator.rs
//! Endpoint validation
//!
//! Syntactic checks happen in [`Endpoint::parse`]; this module adds the
//! resolvability probe, bounded by a timeout so a slow resolver can never
//! stall a toggle.

use crate::redirect::endpoint::{Endpoint, EndpointInput};
use crate::redirect::resolver::HostResolver;
use crate::utils::errors::ValidationError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default bound on a single resolution probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Validates endpoints against syntax and name resolution
#[derive(Clone)]
pub struct EndpointValidator {
    resolver: Arc<dyn HostResolver>,
    probe_timeout: Duration,
}

impl EndpointValidator {
    pub fn new(resolver: Arc<dyn HostResolver>, probe_timeout: Duration) -> Self {
        Self {
            resolver,
            probe_timeout,
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// Syntactic validation only
    pub fn parse(&self, role: &'static str, input: &EndpointInput) -> Result<Endpoint, ValidationError> {
        Endpoint::parse(role, input)
    }

    /// Syntactic validation plus a required resolvability check
    pub async fn validate(
        &self,
        role: &'static str,
        input: &EndpointInput,
    ) -> Result<Endpoint, ValidationError> {
        let endpoint = self.parse(role, input)?;
        if !self.resolves(endpoint.host()).await {
            return Err(ValidationError::UnresolvableHost {
                host: endpoint.host().to_string(),
            });
        }
        Ok(endpoint)
    }

    /// Probe whether `host` resolves; a timeout counts as unresolvable
    pub async fn resolves(&self, host: &str) -> bool {
        match tokio::time::timeout(self.probe_timeout, self.resolver.resolve(host)).await {
            Ok(addrs) if !addrs.is_empty() => {
                debug!("{} resolved to {:?}", host, addrs);
                true
            }
            Ok(_) => {
                warn!("Hostname/IP \"{}\" appears to be invalid.", host);
                false
            }
            Err(_) => {
                warn!(
                    "Resolving \"{}\" timed out after {:?}; treating it as invalid",
                    host, self.probe_timeout
                );
                false
            }
        }
    }
}

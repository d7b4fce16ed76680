// src/redirect/resolver.rs
//! Host name resolution probes
//!
//! The validator only needs to know whether a name resolves, so resolvers
//! answer with the addresses found and leave the policy to the caller.

use async_trait::async_trait;
use serde::Deserialize;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;
use trust_dns_resolver::TokioAsyncResolver;

use crate::utils::errors::{RedirectorError, Result};

/// Resolves host names (or IP literals) to addresses
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Returns every address found; an empty list means the name did not resolve
    async fn resolve(&self, host: &str) -> Vec<IpAddr>;
}

/// Which resolver backs the validator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverKind {
    /// Platform lookup (`getaddrinfo`)
    #[default]
    System,
    /// DNS client built from the system resolver configuration
    Dns,
}

/// Platform name resolution through tokio's blocking-pool lookup
#[derive(Debug, Default, Clone)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn resolve(&self, host: &str) -> Vec<IpAddr> {
        match tokio::net::lookup_host((host, 0)).await {
            Ok(addrs) => addrs.map(|addr| addr.ip()).collect(),
            Err(e) => {
                debug!("System lookup for {} failed: {}", host, e);
                Vec::new()
            }
        }
    }
}

/// DNS resolution via trust-dns, reading `/etc/resolv.conf` and the hosts file
pub struct DnsResolver {
    inner: TokioAsyncResolver,
}

impl DnsResolver {
    pub fn from_system_conf() -> Result<Self> {
        let inner = TokioAsyncResolver::tokio_from_system_conf().map_err(|e| {
            RedirectorError::ConfigError(format!("Failed to read system resolver config: {}", e))
        })?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl HostResolver for DnsResolver {
    async fn resolve(&self, host: &str) -> Vec<IpAddr> {
        match self.inner.lookup_ip(host).await {
            Ok(lookup) => lookup.iter().collect(),
            Err(e) => {
                debug!("DNS lookup for {} failed: {}", host, e);
                Vec::new()
            }
        }
    }
}

/// Build the resolver selected in configuration
pub fn build_resolver(kind: ResolverKind) -> Result<Arc<dyn HostResolver>> {
    match kind {
        ResolverKind::System => Ok(Arc::new(SystemResolver)),
        ResolverKind::Dns => Ok(Arc::new(DnsResolver::from_system_conf()?)),
    }
}

// src/lib.rs
//! Target Redirector Library
//!
//! Redirects proxied requests addressed to one endpoint to another endpoint,
//! optionally mapping an unresolvable original host to loopback in the host
//! tool's hostname resolution settings for the lifetime of the redirection.
//!
//! # Architecture
//!
//! The crate is structured into a few modules:
//!
//! - **redirect**: endpoint validation, DNS overrides, session state machine, registry
//! - **interception**: per-message interceptor, pipeline, audit trail, HTTP proxy
//! - **observability**: tracing and metrics set-up
//! - **utils**: configuration and errors

// Public module exports
pub mod interception;
pub mod observability;
pub mod redirect;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use interception::{HttpProxy, InterceptorPipeline, TrafficInterceptor};
pub use redirect::{
    Endpoint, EndpointInput, RedirectionRule, RedirectionSession, SessionContext, SessionRegistry,
};
pub use utils::config::RedirectorConfig;
pub use utils::errors::{RedirectorError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_HASH: &str = env!("GIT_HASH");

/// Build information
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_timestamp: &'static str,
    pub rustc_version: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            version: VERSION,
            git_hash: GIT_HASH,
            build_timestamp: env!("BUILD_TIMESTAMP"),
            rustc_version: env!("RUSTC_VERSION"),
        }
    }
}

// src/redirect/endpoint.rs
//! Endpoint value types
//!
//! An [`Endpoint`] is a validated `(scheme, host, port)` triple. Raw form
//! values arrive as an [`EndpointInput`] and are only turned into an
//! `Endpoint` once they pass syntactic checks, so every `Endpoint` in the
//! system is known to have a non-blank host and a port in range.

use crate::utils::errors::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// URL scheme understood by the redirector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    /// Port used when a URL omits one
    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    pub fn from_https(https: bool) -> Self {
        if https {
            Scheme::Https
        } else {
            Scheme::Http
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unvalidated endpoint values as collected by a control surface
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointInput {
    /// Host name or IP literal
    #[serde(default)]
    pub host: String,

    /// Port as typed by the user
    #[serde(default)]
    pub port: String,

    /// Whether the endpoint speaks HTTPS
    #[serde(default)]
    pub https: bool,
}

impl EndpointInput {
    pub fn new(host: impl Into<String>, port: impl Into<String>, https: bool) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
            https,
        }
    }
}

impl From<&Endpoint> for EndpointInput {
    fn from(endpoint: &Endpoint) -> Self {
        Self {
            host: endpoint.host.clone(),
            port: endpoint.port.to_string(),
            https: endpoint.scheme == Scheme::Https,
        }
    }
}

/// A validated network destination
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Endpoint {
    scheme: Scheme,
    host: String,
    port: u16,
}

impl Endpoint {
    /// Build an endpoint, rejecting a blank host or a zero port
    pub fn new(
        role: &'static str,
        scheme: Scheme,
        host: impl Into<String>,
        port: u16,
    ) -> Result<Self, ValidationError> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(ValidationError::MissingHost { role });
        }
        if port == 0 {
            return Err(ValidationError::InvalidPort {
                role,
                value: port.to_string(),
            });
        }

        Ok(Self { scheme, host, port })
    }

    /// Parse trimmed form values into an endpoint
    pub fn parse(role: &'static str, input: &EndpointInput) -> Result<Self, ValidationError> {
        let host = input.host.trim();
        if host.is_empty() {
            return Err(ValidationError::MissingHost { role });
        }

        let raw_port = input.port.trim();
        let port = raw_port
            .parse::<u16>()
            .ok()
            .filter(|port| *port != 0)
            .ok_or_else(|| ValidationError::InvalidPort {
                role,
                value: raw_port.to_string(),
            })?;

        Self::new(role, Scheme::from_https(input.https), host, port)
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `scheme://host:port`
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// The destination of a live message as seen by the traffic pipeline
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HttpService {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
}

impl HttpService {
    pub fn new(scheme: Scheme, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme,
            host: host.into(),
            port,
        }
    }

    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

impl From<&Endpoint> for HttpService {
    fn from(endpoint: &Endpoint) -> Self {
        Self {
            scheme: endpoint.scheme,
            host: endpoint.host.clone(),
            port: endpoint.port,
        }
    }
}

/// One `original -> replacement` pair, fixed for the lifetime of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectionRule {
    pub original: Endpoint,
    pub replacement: Endpoint,
}

impl RedirectionRule {
    pub fn new(original: Endpoint, replacement: Endpoint) -> Self {
        Self {
            original,
            replacement,
        }
    }

    /// Exact, case-sensitive comparison of scheme, host and port
    pub fn matches(&self, service: &HttpService) -> bool {
        service.host == self.original.host
            && service.port == self.original.port
            && service.scheme == self.original.scheme
    }

    /// Human-readable description used in notifications
    pub fn summary(&self) -> String {
        format!(
            "Redirection Activated.\nTarget Redirector is now\nredirecting requests for:\n{}\nto:\n{}",
            self.original, self.replacement
        )
    }
}

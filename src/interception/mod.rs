// src/interception/mod.rs
//! Request interception layer
//!
//! - **Interceptor**: per-message matching and rewriting for the active rule
//! - **Pipeline**: registration point dispatching messages to interceptors
//! - **Audit**: append-only trail of interception decisions
//! - **HTTP Proxy**: forward proxy that feeds traffic through the pipeline
//!
//! # Architecture
//!
//! ```text
//! Client ── request ──▶ HttpProxy ──▶ InterceptorPipeline ──▶ TrafficInterceptor
//!                           │                                     (rewrite target)
//!                           ▼
//!                 Upstream (original or replacement)
//! ```

pub mod audit;
pub mod http_proxy;
pub mod interceptor;
pub mod pipeline;

// Re-export commonly used types
pub use audit::{AuditSink, MemoryAudit, TracingAudit};
pub use http_proxy::{HttpProxy, ProxyConfig, ProxyTarget};
pub use interceptor::{Decision, HttpMessage, Interceptor, TrafficInterceptor};
pub use pipeline::{InterceptorHost, InterceptorPipeline};

// src/redirect/mod.rs
//! Redirection session engine
//!
//! This module owns the redirection lifecycle:
//!
//! - **Endpoint**: validated `(scheme, host, port)` values and the rule pair
//! - **Resolver / Validator**: syntax and resolvability checks
//! - **Config Store**: scoped access to the host tool's JSON settings
//! - **DNS Override**: loopback mapping for unresolvable original hosts
//! - **Session**: the `Inactive`/`Active` state machine
//! - **Registry**: the single live session slot
//!
//! # Architecture
//!
//! ```text
//! Control surface
//!     │ request_toggle(original, replacement)
//!     ▼
//! SessionRegistry ──▶ RedirectionSession
//!                        ├─ EndpointValidator ──▶ HostResolver
//!                        ├─ DnsOverrideManager ──▶ ConfigStore
//!                        └─ register/unregister ──▶ InterceptorHost
//! ```

pub mod config_store;
pub mod dns_override;
pub mod endpoint;
pub mod registry;
pub mod resolver;
pub mod session;
pub mod validator;

// Re-export commonly used types
pub use config_store::{ConfigStore, JsonFileStore, MemoryConfigStore, RESOLUTION_SCOPE};
pub use dns_override::{DnsOverrideBackup, DnsOverrideManager, ResolutionRule};
pub use endpoint::{Endpoint, EndpointInput, HttpService, RedirectionRule, Scheme};
pub use registry::SessionRegistry;
pub use resolver::{build_resolver, DnsResolver, HostResolver, ResolverKind, SystemResolver};
pub use session::{
    Notifier, RedirectionSession, SessionContext, SessionSnapshot, SessionState, SessionStatus,
    Severity, TracingNotifier,
};
pub use validator::EndpointValidator;

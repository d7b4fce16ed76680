// src/redirect/session.rs
//! Redirection session lifecycle
//!
//! A session holds one pair of endpoint inputs and moves between two states:
//!
//! ```text
//!            toggle (valid, override ok)
//! Inactive ───────────────────────────────▶ Active
//!    ▲                                        │
//!    └────────────────────────────────────────┘
//!          toggle (restore, unregister)
//! ```
//!
//! Activation validates both endpoints, applies a hostname resolution
//! override when the original host does not resolve, registers the traffic
//! interceptor and then publishes an `Active` snapshot. A failed activation
//! leaves the session `Inactive` with nothing registered or patched.

use crate::interception::audit::{AuditSink, TracingAudit};
use crate::interception::interceptor::{Interceptor, TrafficInterceptor};
use crate::interception::pipeline::InterceptorHost;
use crate::redirect::config_store::{ConfigStore, JsonFileStore, MemoryConfigStore};
use crate::redirect::dns_override::DnsOverrideManager;
use crate::redirect::endpoint::{EndpointInput, RedirectionRule};
use crate::redirect::resolver::build_resolver;
use crate::redirect::validator::EndpointValidator;
use crate::utils::config::ResolutionSettings;
use crate::utils::errors::{RedirectorError, Result};
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{error, info, warn};
use ulid::Ulid;

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Inactive,
    Active,
}

/// Immutable view of a session published to the interceptor
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    state: SessionState,
    rule: Option<Arc<RedirectionRule>>,
}

impl SessionSnapshot {
    pub fn inactive() -> Self {
        Self {
            state: SessionState::Inactive,
            rule: None,
        }
    }

    pub fn active(rule: Arc<RedirectionRule>) -> Self {
        Self {
            state: SessionState::Active,
            rule: Some(rule),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The rule, present only while active
    pub fn active_rule(&self) -> Option<&RedirectionRule> {
        match self.state {
            SessionState::Active => self.rule.as_deref(),
            SessionState::Inactive => None,
        }
    }
}

/// How prominently a notification should be shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// User-visible status channel of the control surface
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, severity: Severity);
}

/// Sends notifications to the log
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        let message = message.replace('\n', " ");
        match severity {
            Severity::Info => info!(target: "target_redirector::notify", "{}", message),
            Severity::Warning => warn!(target: "target_redirector::notify", "{}", message),
            Severity::Error => error!(target: "target_redirector::notify", "{}", message),
        }
    }
}

/// Collaborators shared by every session
#[derive(Clone)]
pub struct SessionContext {
    pub validator: EndpointValidator,
    pub store: Arc<dyn ConfigStore>,
    pub host: Arc<dyn InterceptorHost>,
    pub notifier: Arc<dyn Notifier>,
    pub audit: Arc<dyn AuditSink>,

    /// Settings scope holding the hostname resolution rules
    pub scope: String,

    /// Address unresolvable original hosts are mapped to
    pub loopback: IpAddr,
}

impl SessionContext {
    /// Build the collaborators described by the resolution settings
    pub fn from_settings(
        settings: &ResolutionSettings,
        host: Arc<dyn InterceptorHost>,
    ) -> Result<Self> {
        let resolver = build_resolver(settings.resolver)?;
        let store: Arc<dyn ConfigStore> = match &settings.settings_path {
            Some(path) => Arc::new(JsonFileStore::new(path)),
            None => Arc::new(MemoryConfigStore::default()),
        };

        Ok(Self {
            validator: EndpointValidator::new(resolver, settings.probe_timeout()),
            store,
            host,
            notifier: Arc::new(TracingNotifier),
            audit: Arc::new(TracingAudit),
            scope: settings.scope.clone(),
            loopback: settings.loopback,
        })
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }
}

/// What a control surface needs to render the current session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub session_id: Option<String>,
    pub active: bool,
    pub dns_override: bool,
    pub rule: Option<RedirectionRule>,
    pub activated_at: Option<DateTime<Utc>>,
}

impl SessionStatus {
    pub fn inactive() -> Self {
        Self {
            session_id: None,
            active: false,
            dns_override: false,
            rule: None,
            activated_at: None,
        }
    }
}

/// One activate/deactivate lifecycle for a single rule
pub struct RedirectionSession {
    id: Ulid,
    original: EndpointInput,
    replacement: EndpointInput,
    context: SessionContext,
    snapshot: Arc<ArcSwap<SessionSnapshot>>,
    interceptor: Arc<dyn Interceptor>,
    dns_override: DnsOverrideManager,
    activated_at: Option<DateTime<Utc>>,
}

impl RedirectionSession {
    pub fn new(context: SessionContext, original: EndpointInput, replacement: EndpointInput) -> Self {
        let id = Ulid::new();
        let snapshot = Arc::new(ArcSwap::from_pointee(SessionSnapshot::inactive()));
        let interceptor: Arc<dyn Interceptor> = Arc::new(TrafficInterceptor::new(
            id,
            Arc::clone(&snapshot),
            Arc::clone(&context.audit),
        ));
        let dns_override = DnsOverrideManager::new(Arc::clone(&context.store), context.scope.clone())
            .with_address(context.loopback);

        info!("Created redirection session {}", id);

        Self {
            id,
            original,
            replacement,
            context,
            snapshot,
            interceptor,
            dns_override,
            activated_at: None,
        }
    }

    pub fn id(&self) -> Ulid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.snapshot.load().state()
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    pub fn rule(&self) -> Option<RedirectionRule> {
        self.snapshot.load().active_rule().cloned()
    }

    pub fn dns_override_applied(&self) -> bool {
        self.dns_override.is_applied()
    }

    pub fn status(&self) -> SessionStatus {
        let rule = self.rule();
        SessionStatus {
            session_id: Some(self.id.to_string()),
            active: rule.is_some(),
            dns_override: self.dns_override.is_applied(),
            rule,
            activated_at: self.activated_at,
        }
    }

    /// Flip the session state once; returns whether the session is now active
    pub async fn toggle(&mut self) -> bool {
        match self.state() {
            SessionState::Inactive => self.activate().await,
            SessionState::Active => {
                self.deactivate().await;
                false
            }
        }
    }

    async fn activate(&mut self) -> bool {
        let rule = match self.prepare().await {
            Ok(rule) => Arc::new(rule),
            Err(RedirectorError::Validation(e)) => {
                metrics::counter!("redirector_activations_total", "result" => "invalid").increment(1);
                self.context.notifier.notify(
                    &format!("Invalid hostname and/or port settings.\n\n{}", e),
                    Severity::Warning,
                );
                return false;
            }
            Err(e) => {
                metrics::counter!("redirector_activations_total", "result" => "failed").increment(1);
                error!("Session {} failed to activate: {}", self.id, e);
                self.context.notifier.notify(&e.to_string(), Severity::Error);
                return false;
            }
        };

        self.context
            .host
            .register_interceptor(Arc::clone(&self.interceptor));
        self.snapshot
            .store(Arc::new(SessionSnapshot::active(Arc::clone(&rule))));
        self.activated_at = Some(Utc::now());

        metrics::counter!("redirector_activations_total", "result" => "activated").increment(1);
        info!(
            "Session {} redirecting {} to {}",
            self.id, rule.original, rule.replacement
        );
        self.context.notifier.notify(&rule.summary(), Severity::Info);
        true
    }

    /// Validate inputs and install the resolution override if one is needed
    async fn prepare(&mut self) -> Result<RedirectionRule> {
        let validator = &self.context.validator;

        let original = validator.parse("original", &self.original)?;
        let replacement = validator.validate("replacement", &self.replacement).await?;

        if !validator.resolves(original.host()).await {
            self.context.notifier.notify(
                &format!(
                    "Original hostname \"{}\" appears to be invalid.\n\n\
                     Target Redirector will add an entry to\n\
                     the hostname resolution settings\n\
                     to allow requests with an invalid hostname\n\
                     to be sent via this redirection.",
                    original.host()
                ),
                Severity::Warning,
            );
            self.dns_override.apply(original.host()).await?;

            if !self.context.store.is_persistent() {
                warn!(
                    "Session {}: override for {} is held in memory only and has no effect; \
                     set resolution.settings_path to patch the host tool's settings",
                    self.id,
                    original.host()
                );
            }
        }

        Ok(RedirectionRule::new(original, replacement))
    }

    async fn deactivate(&mut self) {
        if let Err(e) = self.dns_override.restore().await {
            error!("Session {}: {}", self.id, e);
            self.context.notifier.notify(&e.to_string(), Severity::Error);
        }

        self.context.host.unregister_interceptor(&self.interceptor);
        self.snapshot.store(Arc::new(SessionSnapshot::inactive()));
        self.activated_at = None;

        info!("Session {} deactivated", self.id);
    }
}

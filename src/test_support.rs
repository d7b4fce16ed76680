// src/test_support.rs
//! Test doubles shared by the unit tests

use crate::redirect::config_store::{ConfigStore, MemoryConfigStore, RESOLUTION_SCOPE};
use crate::redirect::resolver::HostResolver;
use crate::redirect::session::{Notifier, Severity};
use crate::utils::errors::{RedirectorError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Resolves a fixed set of names to a documentation address
#[derive(Debug, Default)]
pub struct StaticResolver {
    known: HashSet<String>,
    delay: Option<Duration>,
}

impl StaticResolver {
    pub fn new<I, S>(known: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known: known.into_iter().map(Into::into).collect(),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl HostResolver for StaticResolver {
    async fn resolve(&self, host: &str) -> Vec<IpAddr> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.known.contains(host) {
            vec![IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10))]
        } else {
            Vec::new()
        }
    }
}

/// In-memory store whose installs can be made to fail
#[derive(Default)]
pub struct FailingStore {
    inner: MemoryConfigStore,
    fail_install_at: Option<usize>,
    fail_read: bool,
    installs: AtomicUsize,
}

impl FailingStore {
    fn failing_at(index: usize) -> Self {
        Self {
            inner: MemoryConfigStore::new(json!({
                "project_options": { "connections": { "hostname_resolution": [] } }
            })),
            fail_install_at: Some(index),
            fail_read: false,
            installs: AtomicUsize::new(0),
        }
    }

    /// Exports fail, so no settings can be patched
    pub fn failing_read() -> Self {
        Self {
            fail_install_at: None,
            fail_read: true,
            ..Self::failing_at(0)
        }
    }

    /// Every install fails
    pub fn failing_install() -> Self {
        Self::failing_at(0)
    }

    /// The first install succeeds, the second (the restore) fails
    pub fn failing_restore() -> Self {
        Self::failing_at(1)
    }

    pub fn installs(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }

    pub fn rules(&self) -> serde_json::Value {
        self.inner.snapshot()["project_options"]["connections"]["hostname_resolution"].clone()
    }
}

#[async_trait]
impl ConfigStore for FailingStore {
    async fn read_config(&self, scope: &str) -> Result<String> {
        if self.fail_read {
            return Err(RedirectorError::ConfigError(format!(
                "settings for {} could not be exported",
                scope
            )));
        }
        self.inner.read_config(scope).await
    }

    async fn install_config(&self, scope: &str, document: &str) -> Result<()> {
        let index = self.installs.fetch_add(1, Ordering::SeqCst);
        if self.fail_install_at.is_some_and(|at| index >= at) {
            return Err(RedirectorError::ConfigError(format!(
                "settings for {} are read-only",
                scope
            )));
        }
        self.inner.install_config(scope, document).await
    }
}

/// Collects notifications for assertions
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(Severity, String)>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(Severity, String)> {
        self.messages.lock().clone()
    }

    pub fn contains(&self, severity: Severity, needle: &str) -> bool {
        self.messages
            .lock()
            .iter()
            .any(|(s, m)| *s == severity && m.contains(needle))
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        self.messages.lock().push((severity, message.to_string()));
    }
}

/// Settings document with one unrelated resolution rule
pub fn sample_settings() -> serde_json::Value {
    json!({
        "project_options": {
            "connections": {
                "hostname_resolution": [
                    { "enabled": true, "hostname": "intranet", "ip_address": "10.0.0.1" }
                ],
                "timeouts": { "normal": 120000 }
            }
        }
    })
}

/// Scope used by every test session
pub const SCOPE: &str = RESOLUTION_SCOPE;

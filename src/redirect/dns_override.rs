// src/redirect/dns_override.rs
//! Hostname resolution override
//!
//! Maps an unresolvable original host to loopback in the host tool's
//! resolution rules so requests addressed to it can still enter the
//! pipeline, and puts the rules back exactly as they were afterwards.
//!
//! The override is applied by parsing the exported settings, appending one
//! rule to the resolution collection and serializing the result. The backup
//! is the exported text itself, so restoring reinstalls it verbatim.

use crate::redirect::config_store::{value_at_mut, ConfigStore};
use crate::utils::errors::{RedirectorError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One entry of the host tool's hostname resolution collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionRule {
    pub enabled: bool,
    pub hostname: String,
    pub ip_address: String,
}

impl ResolutionRule {
    pub fn loopback(hostname: impl Into<String>, address: IpAddr) -> Self {
        Self {
            enabled: true,
            hostname: hostname.into(),
            ip_address: address.to_string(),
        }
    }
}

/// Verbatim export of the resolution settings taken before patching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsOverrideBackup {
    /// Host the override was added for
    pub hostname: String,

    /// Exported settings document as returned by the store
    pub snapshot: String,
}

/// Applies and reverts one resolution override on behalf of a session
pub struct DnsOverrideManager {
    store: Arc<dyn ConfigStore>,
    scope: String,
    address: IpAddr,
    backup: Option<DnsOverrideBackup>,
}

impl DnsOverrideManager {
    pub fn new(store: Arc<dyn ConfigStore>, scope: impl Into<String>) -> Self {
        Self {
            store,
            scope: scope.into(),
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            backup: None,
        }
    }

    /// Address the overridden host is mapped to
    pub fn with_address(mut self, address: IpAddr) -> Self {
        self.address = address;
        self
    }

    pub fn backup(&self) -> Option<&DnsOverrideBackup> {
        self.backup.as_ref()
    }

    pub fn is_applied(&self) -> bool {
        self.backup.is_some()
    }

    /// Map `hostname` to the loopback address, keeping a backup of the rules
    pub async fn apply(&mut self, hostname: &str) -> Result<&DnsOverrideBackup> {
        if let Some(existing) = &self.backup {
            return Err(RedirectorError::ConfigPatch(format!(
                "override for {} is still applied",
                existing.hostname
            )));
        }

        let snapshot = self
            .store
            .read_config(&self.scope)
            .await
            .map_err(|e| RedirectorError::ConfigPatch(format!("could not read settings: {}", e)))?;

        let patched = self.patch(&snapshot, hostname)?;

        self.store
            .install_config(&self.scope, &patched)
            .await
            .map_err(|e| {
                RedirectorError::ConfigPatch(format!("could not install settings: {}", e))
            })?;

        info!(
            "Added hostname resolution override {} -> {}",
            hostname, self.address
        );

        let backup = self.backup.insert(DnsOverrideBackup {
            hostname: hostname.to_string(),
            snapshot,
        });
        Ok(&*backup)
    }

    /// Reinstall the backed-up rules; succeeds trivially when nothing is applied
    pub async fn restore(&mut self) -> Result<()> {
        let Some(backup) = self.backup.take() else {
            debug!("No hostname resolution override to restore");
            return Ok(());
        };

        match self.store.install_config(&self.scope, &backup.snapshot).await {
            Ok(()) => {
                info!("Removed hostname resolution override for {}", backup.hostname);
                Ok(())
            }
            Err(e) => {
                warn!(
                    "Hostname resolution override for {} may still be present",
                    backup.hostname
                );
                Err(RedirectorError::ConfigRestore(format!(
                    "override {} -> {} could not be removed ({}); remove it manually",
                    backup.hostname, self.address, e
                )))
            }
        }
    }

    fn patch(&self, snapshot: &str, hostname: &str) -> Result<String> {
        let mut document: Value = serde_json::from_str(snapshot).map_err(|e| {
            RedirectorError::ConfigPatch(format!("settings are not valid JSON: {}", e))
        })?;

        let rules = value_at_mut(&mut document, &self.scope).ok_or_else(|| {
            RedirectorError::ConfigPatch(format!("settings export is missing {}", self.scope))
        })?;

        if rules.is_null() {
            *rules = Value::Array(Vec::new());
        }

        let rule = serde_json::to_value(ResolutionRule::loopback(hostname, self.address))?;
        match rules.as_array_mut() {
            Some(entries) => entries.push(rule),
            None => {
                return Err(RedirectorError::ConfigPatch(format!(
                    "{} is not a list of rules",
                    self.scope
                )))
            }
        }

        Ok(serde_json::to_string(&document)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redirect::config_store::{value_at, MemoryConfigStore, RESOLUTION_SCOPE};
    use crate::test_support::FailingStore;
    use proptest::prelude::*;
    use serde_json::json;

    fn store_with(rules: Value) -> Arc<MemoryConfigStore> {
        Arc::new(MemoryConfigStore::new(json!({
            "project_options": {
                "connections": {
                    "hostname_resolution": rules,
                    "upstream_proxy": { "use_user_options": true }
                }
            },
            "user_options": { "misc": { "show_learn_tab": false } }
        })))
    }

    fn rules_of(store: &MemoryConfigStore) -> Vec<ResolutionRule> {
        let settings = store.snapshot();
        serde_json::from_value(value_at(&settings, RESOLUTION_SCOPE).unwrap().clone()).unwrap()
    }

    #[tokio::test]
    async fn test_apply_appends_rule_and_keeps_existing() {
        let existing = ResolutionRule {
            enabled: false,
            hostname: "db.internal".to_string(),
            ip_address: "10.1.1.1".to_string(),
        };
        let store = store_with(json!([existing.clone()]));
        let mut manager = DnsOverrideManager::new(store.clone(), RESOLUTION_SCOPE);

        manager.apply("target.invalid").await.unwrap();

        assert_eq!(
            rules_of(&store),
            vec![
                existing,
                ResolutionRule::loopback("target.invalid", "127.0.0.1".parse().unwrap())
            ]
        );
        assert!(manager.is_applied());
        assert_eq!(store.snapshot()["user_options"], json!({ "misc": { "show_learn_tab": false } }));
    }

    #[tokio::test]
    async fn test_apply_restore_round_trip() {
        let store = store_with(json!([{ "enabled": true, "hostname": "a", "ip_address": "1.2.3.4" }]));
        let before = store.read_config(RESOLUTION_SCOPE).await.unwrap();
        let full_before = store.snapshot();

        let mut manager = DnsOverrideManager::new(store.clone(), RESOLUTION_SCOPE);
        let backup = manager.apply("target.invalid").await.unwrap();
        assert_eq!(backup.snapshot, before);

        manager.restore().await.unwrap();

        assert!(!manager.is_applied());
        assert_eq!(store.read_config(RESOLUTION_SCOPE).await.unwrap(), before);
        assert_eq!(store.snapshot(), full_before);
    }

    #[tokio::test]
    async fn test_apply_on_absent_collection() {
        let store = Arc::new(MemoryConfigStore::new(json!({})));
        let mut manager = DnsOverrideManager::new(store.clone(), RESOLUTION_SCOPE);

        manager.apply("target.invalid").await.unwrap();
        assert_eq!(rules_of(&store).len(), 1);

        manager.restore().await.unwrap();
        assert_eq!(store.snapshot(), json!({}));
    }

    #[tokio::test]
    async fn test_apply_twice_is_rejected() {
        let store = store_with(json!([]));
        let mut manager = DnsOverrideManager::new(store.clone(), RESOLUTION_SCOPE);

        manager.apply("one.invalid").await.unwrap();
        let err = manager.apply("two.invalid").await.unwrap_err();

        assert!(matches!(err, RedirectorError::ConfigPatch(_)));
        assert_eq!(rules_of(&store).len(), 1);
    }

    #[tokio::test]
    async fn test_apply_rejects_unexpected_shape() {
        let store = store_with(json!({ "rules": [] }));
        let mut manager = DnsOverrideManager::new(store.clone(), RESOLUTION_SCOPE);

        let err = manager.apply("target.invalid").await.unwrap_err();
        assert!(matches!(err, RedirectorError::ConfigPatch(_)));
        assert!(!manager.is_applied());
    }

    #[tokio::test]
    async fn test_restore_without_backup_is_noop() {
        let store = Arc::new(FailingStore::default());
        let mut manager = DnsOverrideManager::new(store, RESOLUTION_SCOPE);
        assert!(manager.restore().await.is_ok());
    }

    #[tokio::test]
    async fn test_install_failure_keeps_no_backup() {
        let store = Arc::new(FailingStore::failing_install());
        let mut manager = DnsOverrideManager::new(store, RESOLUTION_SCOPE);

        let err = manager.apply("target.invalid").await.unwrap_err();
        assert!(matches!(err, RedirectorError::ConfigPatch(_)));
        assert!(!manager.is_applied());
    }

    #[tokio::test]
    async fn test_read_failure_keeps_no_backup() {
        let store = Arc::new(FailingStore::failing_read());
        let mut manager = DnsOverrideManager::new(store.clone(), RESOLUTION_SCOPE);

        let err = manager.apply("target.invalid").await.unwrap_err();

        assert!(matches!(err, RedirectorError::ConfigPatch(_)));
        assert!(err.to_string().contains("could not read settings"));
        assert!(manager.backup().is_none());
        assert_eq!(store.installs(), 0);
    }

    #[tokio::test]
    async fn test_backup_holds_export_and_host() {
        let store = store_with(json!([]));
        let before = store.read_config(RESOLUTION_SCOPE).await.unwrap();
        let mut manager = DnsOverrideManager::new(store, RESOLUTION_SCOPE);

        manager.apply("target.invalid").await.unwrap();

        let backup = manager.backup().unwrap();
        assert_eq!(backup.hostname, "target.invalid");
        assert_eq!(backup.snapshot, before);
    }

    #[tokio::test]
    async fn test_restore_failure_is_reported() {
        let store = Arc::new(FailingStore::failing_restore());
        let mut manager = DnsOverrideManager::new(store, RESOLUTION_SCOPE);

        manager.apply("target.invalid").await.unwrap();
        let err = manager.restore().await.unwrap_err();

        assert!(matches!(err, RedirectorError::ConfigRestore(_)));
        assert!(err.to_string().contains("target.invalid"));
        assert!(!manager.is_applied());
    }

    proptest! {
        #[test]
        fn prop_round_trip_preserves_rules(
            hosts in proptest::collection::vec("[a-z]{1,8}\\.[a-z]{2,4}", 0..6),
            target in "[a-z]{1,12}\\.invalid",
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            runtime.block_on(async {
                let existing: Vec<ResolutionRule> = hosts
                    .iter()
                    .map(|h| ResolutionRule::loopback(h.clone(), "10.0.0.2".parse().unwrap()))
                    .collect();
                let store = store_with(serde_json::to_value(&existing).unwrap());
                let before = store.read_config(RESOLUTION_SCOPE).await.unwrap();

                let mut manager = DnsOverrideManager::new(store.clone(), RESOLUTION_SCOPE);
                manager.apply(&target).await.unwrap();

                let patched = rules_of(&store);
                prop_assert_eq!(patched.len(), existing.len() + 1);
                prop_assert_eq!(&patched[..existing.len()], &existing[..]);
                prop_assert_eq!(
                    patched.last().unwrap(),
                    &ResolutionRule::loopback(target.clone(), "127.0.0.1".parse().unwrap())
                );

                manager.restore().await.unwrap();
                prop_assert_eq!(store.read_config(RESOLUTION_SCOPE).await.unwrap(), before);
                Ok(())
            })?;
        }
    }
}

// src/redirect/config_store.rs
//! Host configuration store
//!
//! Settings are a JSON document addressed by dotted scopes such as
//! `project_options.connections.hostname_resolution`. Reading a scope exports
//! a document that contains only that subsection (rooted at the top level,
//! `null` when the subsection is absent); installing a scoped document
//! replaces that subsection and leaves every other setting untouched.

use crate::utils::errors::{RedirectorError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Default scope of the hostname resolution rules
pub const RESOLUTION_SCOPE: &str = "project_options.connections.hostname_resolution";

/// Read/install access to the host tool's settings
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Export the subsection at `scope` as a serialized JSON document
    async fn read_config(&self, scope: &str) -> Result<String>;

    /// Replace the subsection at `scope` with the one found in `document`
    async fn install_config(&self, scope: &str, document: &str) -> Result<()>;

    /// Whether installed settings outlive the process and reach the host tool
    fn is_persistent(&self) -> bool {
        true
    }
}

fn segments(scope: &str) -> impl Iterator<Item = &str> {
    scope.split('.').filter(|segment| !segment.is_empty())
}

/// Value at `scope`, if every segment exists
pub fn value_at<'a>(root: &'a Value, scope: &str) -> Option<&'a Value> {
    segments(scope).try_fold(root, |node, segment| node.get(segment))
}

/// Mutable value at `scope`, if every segment exists
pub fn value_at_mut<'a>(root: &'a mut Value, scope: &str) -> Option<&'a mut Value> {
    segments(scope).try_fold(root, |node, segment| node.get_mut(segment))
}

/// Build a document that holds only `value` at `scope`
pub fn scoped_document(scope: &str, value: Value) -> Value {
    let parts: Vec<&str> = segments(scope).collect();
    parts.iter().rev().fold(value, |inner, segment| {
        let mut map = Map::new();
        map.insert(segment.to_string(), inner);
        Value::Object(map)
    })
}

/// Set `value` at `scope`, creating intermediate objects as needed
pub fn set_at(root: &mut Value, scope: &str, value: Value) -> Result<()> {
    let parts: Vec<&str> = segments(scope).collect();
    let Some((leaf, parents)) = parts.split_last() else {
        return Err(RedirectorError::ConfigError("empty configuration scope".to_string()));
    };

    let mut node = root;
    for segment in parents {
        if node.is_null() {
            *node = Value::Object(Map::new());
        }
        let map = node.as_object_mut().ok_or_else(|| {
            RedirectorError::ConfigError(format!("'{}' in {} is not an object", segment, scope))
        })?;
        node = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    if node.is_null() {
        *node = Value::Object(Map::new());
    }
    let map = node.as_object_mut().ok_or_else(|| {
        RedirectorError::ConfigError(format!("parent of {} is not an object", scope))
    })?;
    map.insert(leaf.to_string(), value);
    Ok(())
}

/// Remove the value at `scope`, pruning parents left empty by the removal
pub fn remove_at(root: &mut Value, scope: &str) {
    let parts: Vec<&str> = segments(scope).collect();
    remove_path(root, &parts);
}

fn remove_path(node: &mut Value, parts: &[&str]) -> bool {
    let Some(map) = node.as_object_mut() else {
        return false;
    };
    match parts {
        [] => false,
        [leaf] => map.shift_remove(*leaf).is_some(),
        [head, rest @ ..] => {
            let Some(child) = map.get_mut(*head) else {
                return false;
            };
            let removed = remove_path(child, rest);
            if removed && child.as_object().is_some_and(|m| m.is_empty()) {
                map.shift_remove(*head);
            }
            removed
        }
    }
}

fn export_scope(settings: &Value, scope: &str) -> Result<String> {
    let value = value_at(settings, scope).cloned().unwrap_or(Value::Null);
    Ok(serde_json::to_string_pretty(&scoped_document(scope, value))?)
}

fn install_scope(settings: &mut Value, scope: &str, document: &str) -> Result<()> {
    let parsed: Value = serde_json::from_str(document)?;
    match value_at(&parsed, scope) {
        Some(Value::Null) | None => remove_at(settings, scope),
        Some(value) => set_at(settings, scope, value.clone())?,
    }
    Ok(())
}

/// Settings held in memory
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    settings: Mutex<Value>,
}

impl MemoryConfigStore {
    pub fn new(settings: Value) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }

    /// Copy of the full settings document
    pub fn snapshot(&self) -> Value {
        self.settings.lock().clone()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn read_config(&self, scope: &str) -> Result<String> {
        export_scope(&self.settings.lock(), scope)
    }

    async fn install_config(&self, scope: &str, document: &str) -> Result<()> {
        install_scope(&mut self.settings.lock(), scope, document)
    }

    fn is_persistent(&self) -> bool {
        false
    }
}

/// Settings persisted as a JSON file
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        info!("Using settings file {:?}", path);
        Self {
            path,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file the next version is written to before it replaces `path`
    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Write `contents` next to the settings file, then rename it into place
    async fn replace_file(&self, contents: &[u8]) -> Result<()> {
        let staging = self.staging_path();

        let written = async {
            let mut file = tokio::fs::File::create(&staging).await?;
            file.write_all(contents).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&staging, &self.path).await
        }
        .await;

        if let Err(e) = written {
            warn!("Failed to replace settings file {:?}: {}", self.path, e);
            if let Err(cleanup) = tokio::fs::remove_file(&staging).await {
                debug!("Could not remove {:?}: {}", staging, cleanup);
            }
            return Err(e.into());
        }
        Ok(())
    }

    async fn load(&self) -> Result<Value> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(Value::Object(Map::new())),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Settings file {:?} does not exist yet", self.path);
                Ok(Value::Object(Map::new()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ConfigStore for JsonFileStore {
    async fn read_config(&self, scope: &str) -> Result<String> {
        let settings = self.load().await?;
        export_scope(&settings, scope)
    }

    async fn install_config(&self, scope: &str, document: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut settings = self.load().await?;
        install_scope(&mut settings, scope, document)?;

        let serialized = serde_json::to_string_pretty(&settings)?;
        self.replace_file(serialized.as_bytes()).await?;
        debug!("Installed {} into {:?}", scope, self.path);
        Ok(())
    }
}

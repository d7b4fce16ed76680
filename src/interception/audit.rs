// src/interception/audit.rs
//! Audit trail of interception decisions
//!
//! Every message the interceptor sees produces a short, append-only series
//! of lines describing what was matched and whether the target changed.

use parking_lot::Mutex;
use tracing::info;

/// Receives audit lines in the order they are produced
pub trait AuditSink: Send + Sync {
    fn record(&self, line: &str);
}

/// Writes audit lines to the `target_redirector::audit` tracing target
#[derive(Debug, Default, Clone)]
pub struct TracingAudit;

impl AuditSink for TracingAudit {
    fn record(&self, line: &str) {
        info!(target: "target_redirector::audit", "{}", line);
    }
}

/// Keeps audit lines in memory
#[derive(Debug, Default)]
pub struct MemoryAudit {
    lines: Mutex<Vec<String>>,
}

impl MemoryAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}

impl AuditSink for MemoryAudit {
    fn record(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}

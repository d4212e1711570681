//! Append-only audit records for policy decisions.
//!
//! Entries land in a bounded in-process ring first and are then forwarded to
//! an optional [`AuditSink`] in the background. Sink failures are logged and
//! dropped; they never fail the task that produced the entry.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tabpilot_core_types::{ActionKind, ActionStep, ExecutionResult};
use tokio::io::AsyncWriteExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::PolicyError;
use crate::model::{PolicyTier, PolicyVerdict};

pub const DEFAULT_AUDIT_CAPACITY: usize = 512;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub action: ActionKind,
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub verdict: PolicyTier,
    pub reason: String,
    /// Set only for steps that went through human confirmation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_approved: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AuditOutcome>,
}

impl AuditEntry {
    pub fn new(step: &ActionStep, page_url: Option<&str>, verdict: &PolicyVerdict) -> Self {
        Self {
            timestamp: Utc::now(),
            action: step.action,
            selector: step.selector.clone(),
            url: page_url.map(str::to_string),
            verdict: verdict.tier,
            reason: verdict.reason.clone(),
            user_approved: None,
            result: None,
        }
    }

    pub fn with_approval(mut self, approved: bool) -> Self {
        self.user_approved = Some(approved);
        self
    }

    pub fn with_result(mut self, result: &ExecutionResult) -> Self {
        self.result = Some(AuditOutcome {
            success: result.success,
            error: result.error.clone(),
        });
        self
    }
}

/// Persistence collaborator for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> Result<(), PolicyError>;
}

#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, entry: &AuditEntry) -> Result<(), PolicyError> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}

/// Appends one JSON document per line.
#[derive(Debug)]
pub struct JsonlAuditSink {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditSink for JsonlAuditSink {
    async fn append(&self, entry: &AuditEntry) -> Result<(), PolicyError> {
        let mut line =
            serde_json::to_string(entry).map_err(|err| PolicyError::Sink(err.to_string()))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|err| PolicyError::Io(err.to_string()))?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|err| PolicyError::Io(err.to_string()))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|err| PolicyError::Io(err.to_string()))?;
        file.flush()
            .await
            .map_err(|err| PolicyError::Io(err.to_string()))?;
        Ok(())
    }
}

/// Bounded ring of the most recent audit entries.
#[derive(Debug)]
pub struct AuditLog {
    capacity: usize,
    queue: Mutex<VecDeque<AuditEntry>>,
}

impl AuditLog {
    /// Ring holding the newest `capacity` entries; a zero capacity keeps one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            queue: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
        }
    }

    pub fn push(&self, entry: AuditEntry) {
        let mut guard = self.queue.lock();
        if guard.len() >= self.capacity {
            guard.pop_front();
        }
        guard.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn snapshot(&self) -> Vec<AuditEntry> {
        self.queue.lock().iter().cloned().collect()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIT_CAPACITY)
    }
}

/// Ring plus optional sink. Cloning shares both.
#[derive(Clone, Default)]
pub struct AuditTrail {
    log: Arc<AuditLog>,
    sink: Option<Arc<dyn AuditSink>>,
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl AuditTrail {
    pub fn new(capacity: usize) -> Self {
        Self {
            log: Arc::new(AuditLog::new(capacity)),
            sink: None,
            pending: Arc::default(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn log(&self) -> &AuditLog {
        &self.log
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.log.snapshot()
    }

    /// Push to the ring and forward to the sink without waiting for it.
    pub fn record(&self, entry: AuditEntry) {
        self.log.push(entry.clone());
        let Some(sink) = self.sink.clone() else {
            return;
        };
        match Handle::try_current() {
            Ok(handle) => {
                let task = handle.spawn(async move {
                    if let Err(err) = sink.append(&entry).await {
                        warn!(error = %err, "audit sink append failed");
                    }
                });
                let mut pending = self.pending.lock();
                pending.retain(|task| !task.is_finished());
                pending.push(task);
            }
            Err(_) => debug!("no async runtime; audit entry kept in memory only"),
        }
    }

    /// Wait for every sink write issued so far.
    pub async fn drain(&self) {
        let tasks: Vec<_> = std::mem::take(&mut *self.pending.lock());
        for task in tasks {
            if let Err(err) = task.await {
                warn!(error = %err, "audit sink task aborted");
            }
        }
    }
}

impl std::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrail")
            .field("entries", &self.log.len())
            .field("capacity", &self.log.capacity())
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

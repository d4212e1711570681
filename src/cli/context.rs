use std::path::Path;
use std::sync::Arc;

use action_primitives::{ExecutionEngine, LivePage};
use anyhow::{Context, Result};
use native_bridge::{MemoryClipboard, NativeClient, NativeCompanionHandler, NativeHost};
use tabpilot_core_types::ActionKind;
use tabpilot_policy_center::{load_snapshot, AuditTrail, JsonlAuditSink, PolicyCenter};
use tracing::info;

use crate::config::AppConfig;

/// Configuration plus the builders every command shares.
pub struct CliContext {
    config: Arc<AppConfig>,
    config_path: Option<std::path::PathBuf>,
}

impl CliContext {
    pub fn new(config: AppConfig, config_path: Option<std::path::PathBuf>) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
        }
    }

    pub fn config(&self) -> &AppConfig {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Built-in rules, then `policy.rules_path`, then the env overlay.
    pub fn policy_center(&self) -> Result<PolicyCenter> {
        let rules_path = self.config.policy.rules_path.as_deref();
        let snapshot = load_snapshot(rules_path).context("Failed to load policy rules")?;
        info!(rev = snapshot.rev, rules = ?rules_path, "Policy rules loaded");
        PolicyCenter::new(snapshot).context("Failed to build policy engine")
    }

    pub fn audit_trail(&self) -> AuditTrail {
        let trail = AuditTrail::new(self.config.policy.audit_capacity);
        match &self.config.policy.audit_path {
            Some(path) => {
                info!(path = %path.display(), "Audit entries are appended to JSONL");
                trail.with_sink(Arc::new(JsonlAuditSink::new(path.clone())))
            }
            None => trail,
        }
    }

    /// Engine over `page` with the native companion served in-process.
    pub fn execution_engine(&self, page: Arc<dyn LivePage>) -> ExecutionEngine {
        let native = &self.config.native;
        let host = NativeHost::new(native, Arc::new(MemoryClipboard::new()));
        let client = NativeClient::in_process(Arc::new(host), native.max_frame_bytes);
        ExecutionEngine::new(page, self.config.engine.clone()).with_handler(
            ActionKind::Native,
            Arc::new(NativeCompanionHandler::new(Arc::new(client))),
        )
    }
}

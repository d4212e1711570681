//! Routing for actions that run outside page-script scope
//!
//! `select_date`, `eval`, `download`, `tabgroup` and `native` need browser
//! privileges or the native companion. The engine only checks their shape
//! and hands them to a registered [`PrivilegedHandler`].

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tabpilot_core_types::{ActionKind, ActionStep};
use tracing::debug;
use url::Url;

use crate::{errors::ActionError, types::ExecCtx};

/// Executes one privileged action. Returned text becomes `extractedData`.
#[async_trait]
pub trait PrivilegedHandler: Send + Sync {
    async fn handle(&self, step: &ActionStep, ctx: &ExecCtx)
        -> Result<Option<String>, ActionError>;
}

#[derive(Clone, Default)]
pub struct PrivilegedRouter {
    handlers: HashMap<ActionKind, Arc<dyn PrivilegedHandler>>,
}

impl std::fmt::Debug for PrivilegedRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.handlers.keys().map(|k| k.as_str()).collect();
        kinds.sort_unstable();
        f.debug_struct("PrivilegedRouter")
            .field("handlers", &kinds)
            .finish()
    }
}

impl PrivilegedRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: ActionKind, handler: Arc<dyn PrivilegedHandler>) {
        self.handlers.insert(kind, handler);
    }

    pub fn with_handler(mut self, kind: ActionKind, handler: Arc<dyn PrivilegedHandler>) -> Self {
        self.register(kind, handler);
        self
    }

    pub fn has(&self, kind: ActionKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub async fn route(
        &self,
        step: &ActionStep,
        ctx: &ExecCtx,
    ) -> Result<Option<String>, ActionError> {
        let handler = self
            .handlers
            .get(&step.action)
            .ok_or_else(|| ActionError::Unsupported(step.action.to_string()))?;
        ctx.ensure_live()?;
        debug!(action_id = %ctx.action_id, action = %step.action, "Routing privileged action");
        handler.handle(step, ctx).await
    }
}

fn required_value<'a>(step: &'a ActionStep, message: &str) -> Result<&'a str, ActionError> {
    step.value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ActionError::InvalidInput(message.to_string()))
}

/// Shape check for privileged actions. Non-privileged kinds pass through.
pub fn validate_privileged(step: &ActionStep) -> Result<(), ActionError> {
    match step.action {
        ActionKind::SelectDate => {
            if step.selector.trim().is_empty() {
                return Err(ActionError::InvalidInput(
                    "select_date action requires a selector".to_string(),
                ));
            }
            let raw = required_value(step, "select_date action requires a date value")?;
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                ActionError::InvalidInput(format!("select_date value must be YYYY-MM-DD: {raw}"))
            })?;
            Ok(())
        }
        ActionKind::Eval => required_value(step, "Eval action requires a script value").map(|_| ()),
        ActionKind::Download => match step.value.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Url::parse(raw).map(|_| ()).map_err(|err| {
                ActionError::InvalidInput(format!("Download URL is invalid: {err}"))
            }),
            _ if !step.selector.trim().is_empty() => Ok(()),
            _ => Err(ActionError::InvalidInput(
                "Download action requires a URL or selector".to_string(),
            )),
        },
        ActionKind::Tabgroup => {
            required_value(step, "Tabgroup action requires a value").map(|_| ())
        }
        ActionKind::Native => {
            let raw = required_value(step, "Native action requires a value")?;
            let value: serde_json::Value = serde_json::from_str(raw).map_err(|err| {
                ActionError::InvalidInput(format!("Native action value is not JSON: {err}"))
            })?;
            match value.get("op").and_then(|op| op.as_str()) {
                Some(op) if !op.is_empty() => Ok(()),
                _ => Err(ActionError::InvalidInput(
                    "Native action value requires an op field".to_string(),
                )),
            }
        }
        _ => Ok(()),
    }
}

//! Routes the `native` action to the companion.

use action_primitives::{ActionError, ExecCtx, PrivilegedHandler};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tabpilot_core_types::ActionStep;
use tracing::info;

use crate::client::NativeClient;
use crate::errors::BridgeError;

/// `native` action handler. The step value is `{"op": ..., "params": {...}}`.
#[derive(Debug, Clone)]
pub struct NativeCompanionHandler {
    client: Arc<NativeClient>,
}

impl NativeCompanionHandler {
    pub fn new(client: Arc<NativeClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PrivilegedHandler for NativeCompanionHandler {
    async fn handle(
        &self,
        step: &ActionStep,
        ctx: &ExecCtx,
    ) -> Result<Option<String>, ActionError> {
        let raw = step.value.as_deref().unwrap_or_default();
        let value: Value = serde_json::from_str(raw).map_err(|err| {
            ActionError::InvalidInput(format!("Native action value is not JSON: {err}"))
        })?;
        let op = value.get("op").and_then(Value::as_str).ok_or_else(|| {
            ActionError::InvalidInput("Native action value requires an op field".to_string())
        })?;
        let params = value.get("params").cloned().unwrap_or(Value::Null);

        let call = self.client.call_raw(op, params);
        let data = tokio::select! {
            _ = ctx.cancel_token.cancelled() => Err(BridgeError::Interrupted),
            outcome = tokio::time::timeout(ctx.remaining_time(), call) => {
                outcome.unwrap_or(Err(BridgeError::Timeout))
            }
        }
        .map_err(|err| match err {
            BridgeError::Timeout => ActionError::Timeout(format!("native {op}")),
            BridgeError::Interrupted => ActionError::Interrupted(format!("native {op}")),
            other => ActionError::Handler(format!("Native {op} failed: {other}")),
        })?;

        info!(action_id = %ctx.action_id, op, "Native companion call finished");
        Ok(match data {
            Value::Null => None,
            Value::String(text) => Some(text),
            other => Some(other.to_string()),
        })
    }
}

//! Navigate primitive - set the page location

use tabpilot_core_types::{ActionKind, ActionStep};
use tracing::debug;
use url::Url;

use crate::{engine::ExecutionEngine, errors::ActionError, types::ExecCtx};

/// Target URL of a navigate step: `value`, else `selector`.
pub(crate) fn navigation_target(step: &ActionStep) -> Result<Url, ActionError> {
    let raw = step
        .value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(step.selector.as_str())
        .trim();
    if raw.is_empty() {
        return Err(ActionError::InvalidInput(
            "Navigate action requires a URL".to_string(),
        ));
    }
    let url = Url::parse(raw)
        .map_err(|err| ActionError::InvalidInput(format!("Invalid URL {raw}: {err}")))?;
    match url.scheme() {
        "http" | "https" | "file" => Ok(url),
        other => Err(ActionError::InvalidInput(format!(
            "Unsupported URL scheme: {other}"
        ))),
    }
}

/// Execute navigate primitive
///
/// Uses the privileged channel when a navigate handler is installed, so
/// restricted pages can still be left.
pub(crate) async fn execute_navigate(
    engine: &ExecutionEngine,
    ctx: &ExecCtx,
    step: &ActionStep,
) -> Result<Option<String>, ActionError> {
    let url = navigation_target(step)?;
    ctx.ensure_live()?;
    if engine.router().has(ActionKind::Navigate) {
        debug!(action_id = %ctx.action_id, url = %url, "Navigating via privileged channel");
        return engine.router().route(step, ctx).await;
    }
    debug!(action_id = %ctx.action_id, url = %url, "Navigating page");
    engine.page().navigate(url.as_str()).await?;
    Ok(None)
}

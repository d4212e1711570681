//! Action primitives implementation
//!
//! One module per page-script action. Privileged actions are validated here
//! and routed to handlers outside page-script scope.
//! 1. click - pointer sequence or direct toggle
//! 2. input - per-keystroke text injection
//! 3. select - native option matching or custom dropdown item
//! 4. scroll - page direction or element into view
//! 5. extract - read-only content
//! 6. navigate - location change, optionally through a privileged channel

mod click;
mod extract;
mod input;
mod navigate;
mod privileged;
mod scroll;
mod select;

pub use extract::extract_content;
pub use privileged::{validate_privileged, PrivilegedHandler, PrivilegedRouter};
pub use select::{match_option, MatchTier};

pub(crate) use click::execute_click;
pub(crate) use extract::execute_extract;
pub(crate) use input::{execute_input, MISSING_VALUE as MISSING_INPUT_VALUE};
pub(crate) use navigate::{execute_navigate, navigation_target};
pub(crate) use scroll::execute_scroll;
pub(crate) use select::execute_select;

use std::time::Duration;
use tabpilot_core_types::ActionStep;
use tracing::debug;

use crate::engine::ExecutionEngine;
use crate::errors::ActionError;
use crate::types::{DomEvent, ElementInfo, ExecCtx};

/// Resolve the step's selector, failing with `TargetNotFound` when absent.
pub(crate) async fn resolve_element(
    engine: &ExecutionEngine,
    ctx: &ExecCtx,
    step: &ActionStep,
) -> Result<ElementInfo, ActionError> {
    ctx.ensure_live()?;
    let selector = step.selector.trim();
    if selector.is_empty() {
        return Err(ActionError::InvalidInput(format!(
            "{} action requires a selector",
            step.action
        )));
    }
    debug!(action_id = %ctx.action_id, selector, "Resolving element");
    engine
        .page()
        .describe(selector)
        .await?
        .ok_or_else(|| ActionError::TargetNotFound(selector.to_string()))
}

/// Smooth-scroll an off-screen element into view and let it settle.
pub(crate) async fn bring_into_view(
    engine: &ExecutionEngine,
    ctx: &ExecCtx,
    selector: &str,
    element: &ElementInfo,
) -> Result<(), ActionError> {
    if element.in_viewport {
        return Ok(());
    }
    debug!(action_id = %ctx.action_id, selector, "Scrolling element into view");
    engine.page().scroll_into_view(selector, true).await?;
    ctx.pause(Duration::from_millis(engine.config().scroll_settle_ms))
        .await
}

/// Full pointer-down, pointer-up, click sequence.
pub(crate) async fn pointer_click(
    engine: &ExecutionEngine,
    ctx: &ExecCtx,
    selector: &str,
) -> Result<(), ActionError> {
    for event in [DomEvent::PointerDown, DomEvent::PointerUp, DomEvent::Click] {
        ctx.ensure_live()?;
        engine.page().dispatch(selector, event).await?;
    }
    Ok(())
}

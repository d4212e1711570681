//! Scroll primitive - page direction, or a specific element into view

use std::time::Duration;
use tabpilot_core_types::ActionStep;
use tracing::debug;

use crate::{
    engine::ExecutionEngine,
    errors::ActionError,
    primitives::resolve_element,
    types::{ExecCtx, ScrollDirection},
};

/// Execute scroll primitive
///
/// With a selector the element is scrolled into view; without one the page
/// root scrolls in the direction given by `value` (`up`, `down`, `top`,
/// `bottom`; default `down`).
pub(crate) async fn execute_scroll(
    engine: &ExecutionEngine,
    ctx: &ExecCtx,
    step: &ActionStep,
) -> Result<Option<String>, ActionError> {
    let page = engine.page();
    let settle = Duration::from_millis(engine.config().scroll_settle_ms);

    if step.selector.trim().is_empty() {
        let direction: ScrollDirection = step.value.as_deref().unwrap_or("down").parse()?;
        debug!(action_id = %ctx.action_id, ?direction, "Scrolling page");
        page.scroll_page(direction).await?;
    } else {
        resolve_element(engine, ctx, step).await?;
        let selector = step.selector.trim();
        debug!(action_id = %ctx.action_id, selector, "Scrolling element into view");
        page.scroll_into_view(selector, true).await?;
    }

    ctx.pause(settle).await?;
    Ok(None)
}

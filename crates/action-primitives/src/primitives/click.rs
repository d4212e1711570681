//! Click primitive - pointer sequence, or direct state change for toggles

use tabpilot_core_types::ActionStep;
use tracing::debug;

use crate::{
    engine::ExecutionEngine,
    errors::ActionError,
    primitives::{bring_into_view, pointer_click, resolve_element},
    types::{DomEvent, ExecCtx},
};

/// Execute click primitive
///
/// Steps:
/// 1. Resolve the element and reject disabled targets
/// 2. Bring it into view if off-screen
/// 3. Checkbox/radio: set checked state directly and fire input + change
/// 4. Anything else: dispatch pointerdown, pointerup, click
pub(crate) async fn execute_click(
    engine: &ExecutionEngine,
    ctx: &ExecCtx,
    step: &ActionStep,
) -> Result<Option<String>, ActionError> {
    let element = resolve_element(engine, ctx, step).await?;
    let selector = step.selector.trim();

    if element.disabled {
        return Err(ActionError::NotEnabled(selector.to_string()));
    }

    bring_into_view(engine, ctx, selector, &element).await?;

    if element.is_native_toggle() {
        let next = match element.input_type.as_deref() {
            Some("radio") => true,
            _ => !element.checked.unwrap_or(false),
        };
        debug!(action_id = %ctx.action_id, selector, checked = next, "Setting toggle state");
        let page = engine.page();
        page.set_checked(selector, next).await?;
        page.dispatch(selector, DomEvent::Input { data: None })
            .await?;
        page.dispatch(selector, DomEvent::Change).await?;
    } else {
        debug!(action_id = %ctx.action_id, selector, "Dispatching pointer sequence");
        pointer_click(engine, ctx, selector).await?;
    }

    Ok(None)
}

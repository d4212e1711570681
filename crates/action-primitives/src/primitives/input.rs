//! Input primitive - clear, then inject text one keystroke at a time

use std::time::Duration;
use tabpilot_core_types::ActionStep;
use tracing::debug;

use crate::{
    engine::ExecutionEngine,
    errors::ActionError,
    primitives::{bring_into_view, resolve_element},
    types::{DomEvent, ExecCtx},
};

pub(crate) const MISSING_VALUE: &str = "Input action requires a value";

/// Execute input primitive
///
/// Each character produces keydown, a value update with an input event,
/// then keyup. A single change event closes the sequence.
pub(crate) async fn execute_input(
    engine: &ExecutionEngine,
    ctx: &ExecCtx,
    step: &ActionStep,
) -> Result<Option<String>, ActionError> {
    let text = step
        .value
        .as_deref()
        .ok_or_else(|| ActionError::InvalidInput(MISSING_VALUE.to_string()))?;

    let element = resolve_element(engine, ctx, step).await?;
    let selector = step.selector.trim();

    if !element.editable {
        return Err(ActionError::InvalidInput(format!(
            "Element is not editable: {selector}"
        )));
    }
    if element.disabled {
        return Err(ActionError::NotEnabled(selector.to_string()));
    }

    bring_into_view(engine, ctx, selector, &element).await?;

    let page = engine.page();
    page.dispatch(selector, DomEvent::Focus).await?;

    let mut typed = if step.should_clear_first() {
        if element.value.as_deref().map_or(false, |v| !v.is_empty()) {
            debug!(action_id = %ctx.action_id, selector, "Clearing existing value");
            page.set_value(selector, "").await?;
            page.dispatch(selector, DomEvent::Input { data: None })
                .await?;
        }
        String::new()
    } else {
        element.value.clone().unwrap_or_default()
    };

    let keystroke_delay = Duration::from_millis(engine.config().keystroke_delay_ms);
    debug!(action_id = %ctx.action_id, chars = text.chars().count(), "Typing");
    for ch in text.chars() {
        ctx.ensure_live()?;
        let key = ch.to_string();
        page.dispatch(selector, DomEvent::KeyDown { key: key.clone() })
            .await?;
        typed.push(ch);
        page.set_value(selector, &typed).await?;
        page.dispatch(
            selector,
            DomEvent::Input {
                data: Some(key.clone()),
            },
        )
        .await?;
        page.dispatch(selector, DomEvent::KeyUp { key }).await?;
        if !keystroke_delay.is_zero() {
            ctx.pause(keystroke_delay).await?;
        }
    }

    page.dispatch(selector, DomEvent::Change).await?;
    Ok(None)
}

//! Select primitive - native option matching with a custom-dropdown fallback

use std::time::Duration;
use tabpilot_core_types::ActionStep;
use tracing::debug;

use crate::{
    engine::ExecutionEngine,
    errors::ActionError,
    primitives::{bring_into_view, pointer_click, resolve_element},
    types::{DomEvent, ExecCtx, SelectOption},
};

/// Which matching tier picked an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    /// Case-insensitive equality with the option value or text
    Exact,
    /// Option text contains the requested value
    Partial,
}

/// Find the option for `requested`, trying exact value/text first and then
/// partial text. Comparison ignores case and surrounding whitespace.
pub fn match_option(options: &[SelectOption], requested: &str) -> Option<(usize, MatchTier)> {
    let needle = requested.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    let exact = options.iter().position(|option| {
        option.value.trim().to_lowercase() == needle || option.text.trim().to_lowercase() == needle
    });
    if let Some(idx) = exact {
        return Some((idx, MatchTier::Exact));
    }
    options
        .iter()
        .position(|option| option.text.to_lowercase().contains(&needle))
        .map(|idx| (idx, MatchTier::Partial))
}

/// Execute select primitive
///
/// Native selects go through [`match_option`]. Anything else is treated as
/// a custom dropdown: open it with a click, then click the first visible
/// item whose text contains the requested value.
pub(crate) async fn execute_select(
    engine: &ExecutionEngine,
    ctx: &ExecCtx,
    step: &ActionStep,
) -> Result<Option<String>, ActionError> {
    let requested = step
        .value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ActionError::InvalidInput("Select action requires a value".to_string()))?;

    let element = resolve_element(engine, ctx, step).await?;
    let selector = step.selector.trim();
    if element.disabled {
        return Err(ActionError::NotEnabled(selector.to_string()));
    }
    let page = engine.page();

    if element.is_native_select() {
        let (idx, tier) = match_option(&element.options, requested).ok_or_else(|| {
            ActionError::OptionNotFound {
                requested: requested.to_string(),
            }
        })?;
        let chosen = element.options[idx].text.clone();
        debug!(action_id = %ctx.action_id, selector, option = %chosen, tier = ?tier, "Selecting option");
        page.select_index(selector, idx).await?;
        page.dispatch(selector, DomEvent::Input { data: None })
            .await?;
        page.dispatch(selector, DomEvent::Change).await?;
        return Ok(Some(chosen));
    }

    bring_into_view(engine, ctx, selector, &element).await?;
    pointer_click(engine, ctx, selector).await?;
    ctx.pause(Duration::from_millis(engine.config().dropdown_settle_ms))
        .await?;

    let needle = requested.trim().to_lowercase();
    let items = page.visible_items().await?;
    let item = items
        .into_iter()
        .find(|item| item.text.to_lowercase().contains(&needle))
        .ok_or_else(|| ActionError::OptionNotFound {
            requested: requested.to_string(),
        })?;
    debug!(action_id = %ctx.action_id, item = %item.selector, "Clicking dropdown item");
    pointer_click(engine, ctx, &item.selector).await?;
    Ok(Some(item.text))
}

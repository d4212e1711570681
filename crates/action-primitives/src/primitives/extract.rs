//! Extract primitive - read-only content for the element's kind

use tabpilot_core_types::ActionStep;

use crate::{
    engine::ExecutionEngine, errors::ActionError, primitives::resolve_element, types::ExecCtx,
    types::ElementInfo,
};

/// Content appropriate to the element: form value, selected option text,
/// image alt text, link text with its href, or plain text.
pub fn extract_content(element: &ElementInfo) -> String {
    match element.tag.as_str() {
        "select" => element
            .selected_text()
            .map(str::to_string)
            .or_else(|| element.value.clone())
            .unwrap_or_default(),
        "input" if element.is_native_toggle() => element.checked.unwrap_or(false).to_string(),
        "input" | "textarea" => element.value.clone().unwrap_or_default(),
        "img" => element.alt.clone().unwrap_or_default(),
        "a" => {
            let text = element.text.trim();
            match element.href.as_deref() {
                Some(href) if text.is_empty() => href.to_string(),
                Some(href) => format!("{text} ({href})"),
                None => text.to_string(),
            }
        }
        _ => element.text.trim().to_string(),
    }
}

pub(crate) async fn execute_extract(
    engine: &ExecutionEngine,
    ctx: &ExecCtx,
    step: &ActionStep,
) -> Result<Option<String>, ActionError> {
    let element = resolve_element(engine, ctx, step).await?;
    Ok(Some(extract_content(&element)))
}

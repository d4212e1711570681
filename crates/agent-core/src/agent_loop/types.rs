//! Core data types exchanged with the loop's collaborators.

use serde::{Deserialize, Serialize};
use tabpilot_core_types::FlowState;

/// Page state captured at the top of an iteration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    /// Current page URL.
    pub url: String,

    #[serde(default)]
    pub title: String,

    /// Interactive elements the model may target.
    #[serde(default)]
    pub elements: Vec<ElementSummary>,

    /// Visible text, truncated by the observer.
    #[serde(default)]
    pub text_excerpt: String,

    /// Document still loading.
    #[serde(default)]
    pub loading: bool,

    /// Page-script access is not available on this page.
    #[serde(default)]
    pub restricted: bool,

    /// Multi-step form progress, when the page has a form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<FlowState>,
}

impl PageSnapshot {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_element(mut self, element: ElementSummary) -> Self {
        self.elements.push(element);
        self
    }

    pub fn with_flow(mut self, flow: FlowState) -> Self {
        self.flow = Some(flow);
        self
    }
}

/// One interactive element, as shown to the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSummary {
    /// CSS selector the model should echo back.
    pub selector: String,

    /// Element tag name.
    pub tag: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,

    /// Visible text or label (truncated).
    #[serde(default)]
    pub text: String,

    /// Current value for form fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(default)]
    pub disabled: bool,
}

impl ElementSummary {
    pub fn new(selector: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }
}

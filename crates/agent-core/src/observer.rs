//! Page-snapshot collaborator.

use action_primitives::FixturePage;
use async_trait::async_trait;
use tabpilot_core_types::FlowState;

use crate::agent_loop::{ElementSummary, PageSnapshot};

/// A console line reported by the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleMessage {
    pub level: String,
    pub text: String,
}

impl ConsoleMessage {
    pub fn is_error(&self) -> bool {
        self.level.eq_ignore_ascii_case("error")
    }
}

/// Captures what the model gets to see at the top of each iteration.
#[async_trait]
pub trait PageObserver: Send + Sync {
    /// Current page state, or `None` when nothing could be captured.
    async fn snapshot(&self) -> Option<PageSnapshot>;

    /// Console output since the previous call.
    async fn drain_console(&self) -> Vec<ConsoleMessage> {
        Vec::new()
    }
}

const TEXT_EXCERPT_CHARS: usize = 4_000;

#[async_trait]
impl PageObserver for FixturePage {
    async fn snapshot(&self) -> Option<PageSnapshot> {
        let elements = self.elements();

        let fields: Vec<_> = elements.iter().filter(|el| el.is_form_field()).collect();
        let step_label = self.step_label();
        let flow = (!fields.is_empty() || step_label.is_some()).then(|| FlowState {
            filled_fields: fields.iter().filter(|el| el.is_filled()).count() as u32,
            total_fields: fields.len() as u32,
            step_label,
        });

        let summaries = elements
            .iter()
            .filter(|el| el.visible)
            .map(|el| ElementSummary {
                selector: el.selector.clone(),
                tag: el.tag.clone(),
                role: el.role.clone(),
                input_type: el.input_type.clone(),
                text: el
                    .label
                    .clone()
                    .filter(|label| !label.is_empty())
                    .unwrap_or_else(|| el.text.clone()),
                value: el.value.clone(),
                disabled: el.disabled,
            })
            .collect();

        Some(PageSnapshot {
            url: self.current_url(),
            title: self.title(),
            elements: summaries,
            text_excerpt: self.text().chars().take(TEXT_EXCERPT_CHARS).collect(),
            loading: self.is_loading(),
            restricted: self.restricted(),
            flow,
        })
    }

    async fn drain_console(&self) -> Vec<ConsoleMessage> {
        FixturePage::drain_console(self)
            .into_iter()
            .map(|line| ConsoleMessage {
                level: line.level,
                text: line.text,
            })
            .collect()
    }
}

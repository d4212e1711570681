//! Page snapshot formatter for model consumption.

use once_cell::sync::Lazy;
use regex::Regex;

use super::types::{ElementSummary, PageSnapshot};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Formats page snapshots as prompt text.
#[derive(Debug, Clone)]
pub struct StateFormatter {
    max_elements: usize,
    max_text_length: usize,
    max_excerpt_length: usize,
}

impl Default for StateFormatter {
    fn default() -> Self {
        Self {
            max_elements: 150,
            max_text_length: 80,
            max_excerpt_length: 1_500,
        }
    }
}

impl StateFormatter {
    pub fn new(max_elements: usize, max_text_length: usize, max_excerpt_length: usize) -> Self {
        Self {
            max_elements,
            max_text_length,
            max_excerpt_length,
        }
    }

    /// Render the snapshot, or a placeholder when none could be taken.
    pub fn format_state(&self, snapshot: Option<&PageSnapshot>) -> String {
        let Some(snapshot) = snapshot else {
            return "## Page\nNo page snapshot is available for this tab.\n".to_string();
        };

        let mut out = String::from("## Page\n");
        out.push_str(&format!("URL: {}\n", snapshot.url));
        if !snapshot.title.is_empty() {
            out.push_str(&format!("Title: {}\n", snapshot.title));
        }
        if snapshot.loading {
            out.push_str("State: still loading\n");
        }
        if snapshot.restricted {
            out.push_str("State: restricted page, only navigate is possible\n");
        }
        if let Some(flow) = &snapshot.flow {
            out.push_str(&format!(
                "Form progress: {}/{} fields filled",
                flow.filled_fields, flow.total_fields
            ));
            if let Some(label) = &flow.step_label {
                out.push_str(&format!(", step \"{label}\""));
            }
            out.push('\n');
        }

        out.push_str(&format!(
            "\n## Interactive Elements ({})\n",
            snapshot.elements.len()
        ));
        for element in snapshot.elements.iter().take(self.max_elements) {
            out.push_str(&self.format_element(element));
            out.push('\n');
        }
        if snapshot.elements.len() > self.max_elements {
            out.push_str(&format!(
                "... {} more elements not shown\n",
                snapshot.elements.len() - self.max_elements
            ));
        }

        let excerpt = collapse(&snapshot.text_excerpt, self.max_excerpt_length);
        if !excerpt.is_empty() {
            out.push_str("\n## Page Text\n");
            out.push_str(&excerpt);
            out.push('\n');
        }
        out
    }

    fn format_element(&self, element: &ElementSummary) -> String {
        let mut line = format!("- `{}` <{}", element.selector, element.tag);
        if let Some(input_type) = &element.input_type {
            line.push_str(&format!(" type={input_type}"));
        }
        if let Some(role) = &element.role {
            line.push_str(&format!(" role={role}"));
        }
        line.push('>');
        let text = collapse(&element.text, self.max_text_length);
        if !text.is_empty() {
            line.push_str(&format!(" \"{text}\""));
        }
        if let Some(value) = element.value.as_deref().filter(|v| !v.is_empty()) {
            line.push_str(&format!(" value=\"{}\"", collapse(value, self.max_text_length)));
        }
        if element.disabled {
            line.push_str(" (disabled)");
        }
        line
    }
}

/// Collapse runs of whitespace and cut to `max_chars`.
fn collapse(text: &str, max_chars: usize) -> String {
    let flat = WHITESPACE.replace_all(text.trim(), " ");
    if flat.chars().count() <= max_chars {
        flat.into_owned()
    } else {
        let head: String = flat.chars().take(max_chars).collect();
        format!("{head}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabpilot_core_types::FlowState;

    #[test]
    fn formats_elements_and_progress() {
        let snapshot = PageSnapshot::new("https://example.test/signup")
            .with_title("Sign up")
            .with_element(ElementSummary::new("#email", "input").with_text("Email"))
            .with_flow(FlowState {
                filled_fields: 1,
                total_fields: 4,
                step_label: Some("Step 1 of 2".into()),
            });
        let text = StateFormatter::default().format_state(Some(&snapshot));
        assert!(text.contains("URL: https://example.test/signup"));
        assert!(text.contains("- `#email` <input> \"Email\""));
        assert!(text.contains("1/4 fields filled, step \"Step 1 of 2\""));
    }

    #[test]
    fn caps_element_list() {
        let mut snapshot = PageSnapshot::new("https://example.test");
        for i in 0..5 {
            snapshot = snapshot.with_element(ElementSummary::new(format!("#b{i}"), "button"));
        }
        let text = StateFormatter::new(2, 80, 100).format_state(Some(&snapshot));
        assert!(text.contains("... 3 more elements not shown"));
        assert!(!text.contains("#b2"));
    }

    #[test]
    fn missing_snapshot_has_placeholder() {
        let text = StateFormatter::default().format_state(None);
        assert!(text.contains("No page snapshot"));
    }

    #[test]
    fn whitespace_is_collapsed() {
        assert_eq!(collapse("  a \n\n b\tc ", 10), "a b c");
        assert_eq!(collapse("abcdef", 3), "abc…");
    }
}

//! Derived views over loop history: stuck detection and the history digest.
//!
//! Both are pure functions of the entries they are given.

use std::fmt::Write;

use tabpilot_core_types::LoopEntry;

/// True when the last `window` entries show no progress: same page URL, same
/// filled-field count, same step label, and every result succeeded.
///
/// Fewer than `window` entries, or a window below 2, is never stuck.
pub fn is_stuck(history: &[LoopEntry], window: usize) -> bool {
    if window < 2 || history.len() < window {
        return false;
    }
    let recent = &history[history.len() - window..];
    let first = &recent[0];
    recent.iter().all(|entry| {
        !entry.has_failure()
            && entry.page_url == first.page_url
            && entry.filled_fields() == first.filled_fields()
            && entry.step_label() == first.step_label()
    })
}

/// Text digest of the last `window` entries; older ones are counted, not shown.
pub fn summarize_history(history: &[LoopEntry], window: usize) -> String {
    if history.is_empty() {
        return "No actions taken yet.".to_string();
    }
    let shown = window.min(history.len());
    let omitted = history.len() - shown;

    let mut digest = String::new();
    if omitted > 0 {
        let _ = writeln!(digest, "({omitted} earlier iterations omitted)");
    }
    for entry in &history[omitted..] {
        let explanation = entry.plan.explanation.trim();
        let _ = writeln!(
            digest,
            "Iteration {} on {}: {}",
            entry.iteration,
            entry.page_url,
            if explanation.is_empty() {
                "(no explanation)"
            } else {
                explanation
            }
        );
        let mut results = entry.results.iter();
        for step in &entry.plan.actions {
            match results.next() {
                Some(result) => {
                    let _ = writeln!(digest, "  - {}: {}", step.label(), result.outcome_line());
                }
                None => {
                    let _ = writeln!(digest, "  - {}: not run", step.label());
                }
            }
        }
    }
    digest.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabpilot_core_types::{ActionKind, ActionPlan, ActionStep, ExecutionResult, FlowState};

    fn entry(iteration: u32, url: &str, filled: u32, label: &str, ok: bool) -> LoopEntry {
        let step = ActionStep::new(ActionKind::Click, "button.next");
        let result = if ok {
            ExecutionResult::success(&step, 5)
        } else {
            ExecutionResult::failure(&step, "Element not found: button.next", 5)
        };
        LoopEntry::new(
            iteration,
            url,
            ActionPlan::single(format!("step {iteration}"), step),
            vec![result],
        )
        .with_flow(FlowState {
            filled_fields: filled,
            total_fields: 6,
            step_label: Some(label.to_string()),
        })
    }

    fn same(n: u32) -> Vec<LoopEntry> {
        (1..=n)
            .map(|i| entry(i, "https://example.test/form", 2, "Step 1 of 3", true))
            .collect()
    }

    #[test]
    fn three_identical_entries_are_stuck() {
        assert!(is_stuck(&same(3), 3));
        assert!(!is_stuck(&same(2), 3));
    }

    #[test]
    fn any_changed_dimension_clears_stuck() {
        let mut url = same(3);
        url[2].page_url = "https://example.test/form/2".into();
        assert!(!is_stuck(&url, 3));

        let mut filled = same(3);
        filled[1] = entry(2, "https://example.test/form", 3, "Step 1 of 3", true);
        assert!(!is_stuck(&filled, 3));

        let mut label = same(3);
        label[2] = entry(3, "https://example.test/form", 2, "Step 2 of 3", true);
        assert!(!is_stuck(&label, 3));

        let mut failed = same(3);
        failed[0] = entry(1, "https://example.test/form", 2, "Step 1 of 3", false);
        assert!(!is_stuck(&failed, 3));
    }

    #[test]
    fn only_the_trailing_window_counts() {
        let mut history = vec![entry(1, "https://example.test/start", 0, "Intro", false)];
        history.extend(same(3).into_iter().map(|mut e| {
            e.iteration += 1;
            e
        }));
        assert!(is_stuck(&history, 3));
    }

    #[test]
    fn digest_keeps_last_window_and_counts_the_rest() {
        let history: Vec<LoopEntry> = (1..=11)
            .map(|i| entry(i, "https://example.test/form", i, "Step 1", true))
            .collect();
        let digest = summarize_history(&history, 8);
        assert!(digest.starts_with("(3 earlier iterations omitted)"));
        assert!(!digest.contains("Iteration 3 "));
        assert!(digest.contains("Iteration 4 on https://example.test/form: step 4"));
        assert!(digest.contains("Iteration 11 "));
        assert_eq!(digest.matches("Iteration ").count(), 8);
    }

    #[test]
    fn digest_shows_per_step_outcome() {
        let history = vec![entry(1, "https://example.test/form", 0, "Step 1", false)];
        let digest = summarize_history(&history, 8);
        assert!(!digest.contains("omitted"));
        assert!(digest.contains("failed: Element not found: button.next"));
    }

    #[test]
    fn empty_history_digest() {
        assert_eq!(summarize_history(&[], 8), "No actions taken yet.");
    }
}

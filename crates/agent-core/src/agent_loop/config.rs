//! Configuration for the task orchestrator and loop runner.

use serde::{Deserialize, Serialize};

/// Goal-complexity heuristic that picks a task's loop budget.
///
/// A goal mentioning any complex keyword gets `complex_loops`; otherwise a
/// goal of at most `simple_word_limit` words gets `simple_loops`; anything
/// else gets `standard_loops`. Keywords match whole words, case-insensitively.
/// `fixed_loops` bypasses the heuristic entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopBudget {
    pub simple_loops: u32,
    pub standard_loops: u32,
    pub complex_loops: u32,
    pub simple_word_limit: usize,
    pub complex_keywords: Vec<String>,
    pub fixed_loops: Option<u32>,
}

impl Default for LoopBudget {
    fn default() -> Self {
        Self {
            simple_loops: 10,
            standard_loops: 25,
            complex_loops: 40,
            simple_word_limit: 12,
            complex_keywords: [
                "and then",
                "compare",
                "research",
                "multiple",
                "every",
                "each",
                "all",
                "checkout",
                "apply",
                "application",
                "fill out",
                "form",
                "book",
                "register",
                "sign up",
            ]
            .iter()
            .map(|k| k.to_string())
            .collect(),
            fixed_loops: None,
        }
    }
}

impl LoopBudget {
    /// Budget with no heuristic: every goal gets `loops`.
    pub fn fixed(loops: u32) -> Self {
        Self {
            fixed_loops: Some(loops),
            ..Self::default()
        }
    }

    /// Loop budget for a goal. Always at least 1.
    pub fn max_loops_for(&self, goal: &str) -> u32 {
        if let Some(fixed) = self.fixed_loops {
            return fixed.max(1);
        }
        let words: Vec<String> = goal
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();

        let budget = if self
            .complex_keywords
            .iter()
            .any(|keyword| contains_phrase(&words, keyword))
        {
            self.complex_loops
        } else if words.len() <= self.simple_word_limit {
            self.simple_loops
        } else {
            self.standard_loops
        };
        budget.max(1)
    }
}

fn contains_phrase(words: &[String], phrase: &str) -> bool {
    let needle: Vec<String> = phrase.split_whitespace().map(str::to_lowercase).collect();
    !needle.is_empty()
        && words
            .windows(needle.len())
            .any(|window| window.iter().zip(&needle).all(|(w, n)| w == n))
}

/// Configuration for the orchestrator state machine and the loop runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Loop budget heuristic applied on `start_task`.
    pub budget: LoopBudget,

    /// Entries compared by stuck detection.
    /// Default: 3
    pub stuck_window: usize,

    /// Entries shown verbatim in the history digest.
    /// Default: 8
    pub summary_window: usize,

    /// Timeout for one model call in milliseconds.
    /// Default: 60000 (60 seconds)
    pub model_timeout_ms: u64,

    /// Consecutive model or adapter failures before the task errors out.
    /// Default: 3
    pub max_consecutive_failures: u32,

    /// Pause after each completed iteration in milliseconds.
    /// Default: 100
    pub wait_between_steps_ms: u64,

    /// Completed exchanges kept in the model conversation.
    /// Default: 4
    pub conversation_turns: usize,

    /// Recent console errors surfaced in the prompt.
    /// Default: 5
    pub console_error_limit: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            budget: LoopBudget::default(),
            stuck_window: 3,
            summary_window: 8,
            model_timeout_ms: 60_000,
            max_consecutive_failures: 3,
            wait_between_steps_ms: 100,
            conversation_turns: 4,
            console_error_limit: 5,
        }
    }
}

impl OrchestratorConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a minimal config for testing.
    pub fn minimal() -> Self {
        Self {
            budget: LoopBudget::default(),
            stuck_window: 3,
            summary_window: 8,
            model_timeout_ms: 1_000,
            max_consecutive_failures: 2,
            wait_between_steps_ms: 0,
            conversation_turns: 2,
            console_error_limit: 3,
        }
    }

    /// Builder: pin the loop budget for every goal.
    pub fn max_loops(mut self, loops: u32) -> Self {
        self.budget.fixed_loops = Some(loops);
        self
    }

    /// Builder: set model timeout.
    pub fn model_timeout(mut self, ms: u64) -> Self {
        self.model_timeout_ms = ms;
        self
    }

    /// Builder: set stuck detection window.
    pub fn stuck_window(mut self, entries: usize) -> Self {
        self.stuck_window = entries;
        self
    }

    /// Builder: set history digest window.
    pub fn summary_window(mut self, entries: usize) -> Self {
        self.summary_window = entries;
        self
    }

    /// Builder: set consecutive failure limit.
    pub fn max_consecutive_failures(mut self, count: u32) -> Self {
        self.max_consecutive_failures = count;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.stuck_window, 3);
        assert_eq!(config.summary_window, 8);
        assert_eq!(config.max_consecutive_failures, 3);
    }

    #[test]
    fn test_builder() {
        let config = OrchestratorConfig::new()
            .max_loops(5)
            .model_timeout(250)
            .stuck_window(4);

        assert_eq!(config.budget.max_loops_for("anything at all"), 5);
        assert_eq!(config.model_timeout_ms, 250);
        assert_eq!(config.stuck_window, 4);
    }

    #[test]
    fn budget_follows_goal_complexity() {
        let budget = LoopBudget::default();
        assert_eq!(budget.max_loops_for("Open the pricing page"), 10);
        assert_eq!(
            budget.max_loops_for("Find the cheapest direct flight from Lisbon to Oslo in late May please"),
            25
        );
        assert_eq!(budget.max_loops_for("Compare two laptops"), 40);
        assert_eq!(
            budget.max_loops_for("Fill out the contact form and then send it"),
            40
        );
    }

    #[test]
    fn keywords_match_whole_words_only() {
        let budget = LoopBudget::default();
        // "formal" must not trip the "form" keyword
        assert_eq!(budget.max_loops_for("Write a formal greeting"), 10);
    }

    #[test]
    fn budget_is_deterministic() {
        let budget = LoopBudget::default();
        let goal = "Research hotels in Porto";
        assert_eq!(budget.max_loops_for(goal), budget.max_loops_for(goal));
    }

    #[test]
    fn config_reads_partial_yaml() {
        let config: OrchestratorConfig =
            serde_yaml::from_str("stuck_window: 5\nbudget:\n  simple_loops: 6\n").unwrap();
        assert_eq!(config.stuck_window, 5);
        assert_eq!(config.summary_window, 8);
        assert_eq!(config.budget.max_loops_for("Open it"), 6);
    }
}

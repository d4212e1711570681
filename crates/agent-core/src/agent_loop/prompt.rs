//! Prompt assembly for the agent loop.
//!
//! The wording is not load-bearing; the runner only needs a system prompt
//! and one user turn per model call.

use super::orchestrator::{Clarification, TaskPhase};
use super::state_formatter::StateFormatter;
use super::types::PageSnapshot;

/// Default system prompt for the agent loop.
pub const AGENT_LOOP_SYSTEM_PROMPT: &str = r#"You are a browser automation agent working inside the user's live tab.

Each turn you receive the task, what you have done so far, and the current page.
Respond with exactly ONE tool call. Only the first call is used.

## Action tools
click, input, select, select_date, scroll, extract, navigate, eval, download, tabgroup, native.
- Always pass the CSS `selector` exactly as listed in the page elements.
- Pass text, option labels, URLs and dates in `value`.
- Declare an honest `risk`: high for purchases, irreversible or destructive steps,
  medium for anything that sends data, low otherwise.
- Use `waitFor: "urlChange"` when the action navigates, `"networkIdle"` after submitting.

## Control tools
- ask_user: the goal is ambiguous and you need an answer before acting.
- task_ready: you understand the goal and execution can start.
- checkpoint: the user must act (login, captcha, payment details) or review something.
- task_complete: the goal is achieved; summarize what was done.

Never type passwords, card numbers or one-time codes. Hand those steps to the user
with a checkpoint instead."#;

/// Everything the assembler may draw on for one turn.
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub goal: &'a str,
    pub phase: TaskPhase,
    pub clarifications: &'a [Clarification],
    pub snapshot: Option<&'a PageSnapshot>,
    pub history_digest: &'a str,
    pub loop_count: u32,
    pub max_loops: u32,
    pub stuck: bool,
    pub console_errors: &'a [String],
}

/// Builds the text sent to the model.
pub trait PromptAssembler: Send + Sync {
    fn system_prompt(&self) -> String;

    fn user_message(&self, ctx: &PromptContext<'_>) -> String;
}

/// Markdown-sectioned prompt over the snapshot formatter.
#[derive(Debug, Clone, Default)]
pub struct DefaultPromptAssembler {
    formatter: StateFormatter,
}

impl DefaultPromptAssembler {
    pub fn new(formatter: StateFormatter) -> Self {
        Self { formatter }
    }
}

impl PromptAssembler for DefaultPromptAssembler {
    fn system_prompt(&self) -> String {
        AGENT_LOOP_SYSTEM_PROMPT.to_string()
    }

    fn user_message(&self, ctx: &PromptContext<'_>) -> String {
        let mut message = String::new();

        message.push_str("## Task\n");
        message.push_str(ctx.goal);
        message.push('\n');

        if !ctx.clarifications.is_empty() {
            message.push_str("\n## Clarifications\n");
            for item in ctx.clarifications {
                message.push_str(&format!("Q: {}\nA: {}\n", item.question, item.answer));
            }
        }

        if ctx.phase == TaskPhase::Clarifying {
            message.push_str(
                "\nIf the task is clear, call task_ready. Otherwise call ask_user.\n",
            );
        } else {
            message.push_str(&format!(
                "\n## Step Info\nIteration {} of {}\n",
                ctx.loop_count + 1,
                ctx.max_loops
            ));
        }

        message.push_str("\n## Previous Actions\n");
        message.push_str(ctx.history_digest);
        message.push('\n');

        if ctx.stuck {
            message.push_str(
                "\n## Warning\nThe last iterations made no visible progress: same page, same \
                 form state. Try a different element or approach, or raise a checkpoint.\n",
            );
        }

        if !ctx.console_errors.is_empty() {
            message.push_str("\n## Console Errors\n");
            for line in ctx.console_errors {
                message.push_str(&format!("- {line}\n"));
            }
        }

        message.push('\n');
        message.push_str(&self.formatter.format_state(ctx.snapshot));
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(phase: TaskPhase, stuck: bool, errors: &'a [String]) -> PromptContext<'a> {
        PromptContext {
            goal: "Subscribe to the newsletter",
            phase,
            clarifications: &[],
            snapshot: None,
            history_digest: "No actions taken yet.",
            loop_count: 2,
            max_loops: 10,
            stuck,
            console_errors: errors,
        }
    }

    #[test]
    fn executing_prompt_has_step_info() {
        let text = DefaultPromptAssembler::default().user_message(&ctx(
            TaskPhase::Executing,
            false,
            &[],
        ));
        assert!(text.starts_with("## Task\nSubscribe to the newsletter"));
        assert!(text.contains("Iteration 3 of 10"));
        assert!(!text.contains("## Warning"));
    }

    #[test]
    fn stuck_notice_and_console_errors_are_included() {
        let errors = vec!["TypeError: x is undefined".to_string()];
        let text = DefaultPromptAssembler::default().user_message(&ctx(
            TaskPhase::Observing,
            true,
            &errors,
        ));
        assert!(text.contains("## Warning"));
        assert!(text.contains("- TypeError: x is undefined"));
    }

    #[test]
    fn clarifying_prompt_asks_for_readiness() {
        let text = DefaultPromptAssembler::default().user_message(&ctx(
            TaskPhase::Clarifying,
            false,
            &[],
        ));
        assert!(text.contains("call task_ready"));
        assert!(!text.contains("## Step Info"));
    }
}

//! Executes one [`ActionStep`] against the live page.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tabpilot_core_types::{ActionKind, ActionStep, ExecutionResult};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::ActionError;
use crate::page::LivePage;
use crate::primitives::{self, PrivilegedHandler, PrivilegedRouter};
use crate::types::ExecCtx;
use crate::waiting::{DefaultWaitStrategy, WaitConfig, WaitStrategy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Deadline for one step, dispatch through settlement
    pub step_timeout_ms: u64,

    /// Settle delay after scrolling an element into view
    pub scroll_settle_ms: u64,

    /// Delay between opening a custom dropdown and reading its items
    pub dropdown_settle_ms: u64,

    /// Pause between injected keystrokes
    pub keystroke_delay_ms: u64,

    pub wait: WaitConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_timeout_ms: 30_000,
            scroll_settle_ms: 150,
            dropdown_settle_ms: 100,
            keystroke_delay_ms: 0,
            wait: WaitConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn minimal() -> Self {
        Self {
            step_timeout_ms: 5_000,
            scroll_settle_ms: 0,
            dropdown_settle_ms: 0,
            keystroke_delay_ms: 0,
            wait: WaitConfig::minimal(),
        }
    }

    pub fn with_wait(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_step_timeout_ms(mut self, ms: u64) -> Self {
        self.step_timeout_ms = ms;
        self
    }
}

/// Action Execution Engine.
///
/// `execute` never fails: every error becomes an unsuccessful
/// [`ExecutionResult`]. Steps are serialized per engine, so one engine owns
/// its page for the duration of a task.
pub struct ExecutionEngine {
    page: Arc<dyn LivePage>,
    wait_strategy: Arc<dyn WaitStrategy>,
    router: PrivilegedRouter,
    config: EngineConfig,
    page_lock: Mutex<()>,
}

impl ExecutionEngine {
    pub fn new(page: Arc<dyn LivePage>, config: EngineConfig) -> Self {
        let wait_strategy = Arc::new(DefaultWaitStrategy::new(config.wait.clone()));
        Self {
            page,
            wait_strategy,
            router: PrivilegedRouter::default(),
            config,
            page_lock: Mutex::new(()),
        }
    }

    pub fn with_wait_strategy(mut self, wait_strategy: Arc<dyn WaitStrategy>) -> Self {
        self.wait_strategy = wait_strategy;
        self
    }

    pub fn with_handler(mut self, kind: ActionKind, handler: Arc<dyn PrivilegedHandler>) -> Self {
        self.router.register(kind, handler);
        self
    }

    pub fn with_router(mut self, router: PrivilegedRouter) -> Self {
        self.router = router;
        self
    }

    pub fn page(&self) -> &Arc<dyn LivePage> {
        &self.page
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn router(&self) -> &PrivilegedRouter {
        &self.router
    }

    /// Execute exactly one step and report how it went.
    pub async fn execute(&self, step: &ActionStep, cancel: &CancellationToken) -> ExecutionResult {
        let _page_guard = self.page_lock.lock().await;
        let start_instant = Instant::now();
        let ctx = ExecCtx::new(
            Duration::from_millis(self.config.step_timeout_ms),
            cancel.clone(),
        );

        info!(
            action_id = %ctx.action_id,
            action = %step.action,
            selector = %step.selector,
            wait_for = ?step.wait_for,
            "Executing action"
        );

        let outcome = self.run(step, &ctx).await;
        let latency_ms = start_instant.elapsed().as_millis() as u64;

        match outcome {
            Ok(extracted) => {
                info!(
                    action_id = %ctx.action_id,
                    latency_ms = latency_ms,
                    "Action completed successfully"
                );
                let result = ExecutionResult::success(step, latency_ms);
                match extracted {
                    Some(data) => result.with_extracted(data),
                    None => result,
                }
            }
            Err(err) => {
                warn!(
                    action_id = %ctx.action_id,
                    latency_ms = latency_ms,
                    kind = err.kind(),
                    error = %err,
                    "Action failed"
                );
                ExecutionResult::failure(step, err.to_string(), latency_ms)
            }
        }
    }

    async fn run(&self, step: &ActionStep, ctx: &ExecCtx) -> Result<Option<String>, ActionError> {
        ctx.ensure_live()?;
        validate_shape(step)?;

        if step.action != ActionKind::Navigate && self.page.is_restricted().await? {
            let url = self.page.url().await.unwrap_or_default();
            return Err(ActionError::RestrictedPage(url));
        }

        let url_before = self.page.url().await?;

        let extracted = match step.action {
            ActionKind::Click => primitives::execute_click(self, ctx, step).await?,
            ActionKind::Input => primitives::execute_input(self, ctx, step).await?,
            ActionKind::Select => primitives::execute_select(self, ctx, step).await?,
            ActionKind::Scroll => primitives::execute_scroll(self, ctx, step).await?,
            ActionKind::Extract => primitives::execute_extract(self, ctx, step).await?,
            ActionKind::Navigate => primitives::execute_navigate(self, ctx, step).await?,
            ActionKind::SelectDate
            | ActionKind::Eval
            | ActionKind::Download
            | ActionKind::Tabgroup
            | ActionKind::Native => self.router.route(step, ctx).await?,
        };

        if settles_after(step.action) {
            let outcome = self
                .wait_strategy
                .wait(
                    self.page.as_ref(),
                    ctx,
                    step.wait_for,
                    &url_before,
                    step.timeout_ms.map(Duration::from_millis),
                )
                .await?;
            debug!(action_id = %ctx.action_id, outcome = ?outcome, "Post-action wait finished");
        }

        Ok(extracted)
    }
}

/// Checks that need no page access.
fn validate_shape(step: &ActionStep) -> Result<(), ActionError> {
    match step.action {
        ActionKind::Input if step.value.is_none() => Err(ActionError::InvalidInput(
            primitives::MISSING_INPUT_VALUE.to_string(),
        )),
        ActionKind::Navigate => primitives::navigation_target(step).map(|_| ()),
        kind if kind.is_privileged() => primitives::validate_privileged(step),
        _ => Ok(()),
    }
}

fn settles_after(kind: ActionKind) -> bool {
    matches!(
        kind,
        ActionKind::Click
            | ActionKind::Input
            | ActionKind::Select
            | ActionKind::Scroll
            | ActionKind::Navigate
            | ActionKind::SelectDate
    )
}

//! Post-action settle strategies.
//!
//! Every wait polls the page through [`LivePage`] and sleeps through
//! [`ExecCtx::pause`], so a cancelled context ends any wait at the next poll.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tabpilot_core_types::WaitFor;
use tokio::time::Instant;
use tracing::debug;

use crate::errors::ActionError;
use crate::page::LivePage;
use crate::types::{ExecCtx, WaitOutcome};

/// Timing knobs for the wait strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    /// Mutation-free window that counts as a stable DOM
    pub dom_quiet_ms: u64,

    /// Hard bound for `domStable`
    pub dom_timeout_ms: u64,

    /// Extra delay after the DOM settles for `networkIdle`
    pub network_settle_ms: u64,

    /// Hard bound for `urlChange`
    pub url_timeout_ms: u64,

    /// Fixed delay when the step names no strategy
    pub default_delay_ms: u64,

    /// Poll period for mutation and location checks
    pub poll_interval_ms: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            dom_quiet_ms: 300,
            dom_timeout_ms: 5_000,
            network_settle_ms: 500,
            url_timeout_ms: 5_000,
            default_delay_ms: 150,
            poll_interval_ms: 50,
        }
    }
}

impl WaitConfig {
    /// Short bounds for tests and scripted runs.
    pub fn minimal() -> Self {
        Self {
            dom_quiet_ms: 20,
            dom_timeout_ms: 200,
            network_settle_ms: 10,
            url_timeout_ms: 200,
            default_delay_ms: 0,
            poll_interval_ms: 5,
        }
    }

    pub fn with_dom_quiet_ms(mut self, ms: u64) -> Self {
        self.dom_quiet_ms = ms;
        self
    }

    pub fn with_dom_timeout_ms(mut self, ms: u64) -> Self {
        self.dom_timeout_ms = ms;
        self
    }

    pub fn with_url_timeout_ms(mut self, ms: u64) -> Self {
        self.url_timeout_ms = ms;
        self
    }

    pub fn with_default_delay_ms(mut self, ms: u64) -> Self {
        self.default_delay_ms = ms;
        self
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Waiting strategy trait
#[async_trait]
pub trait WaitStrategy: Send + Sync {
    /// Settle after a mutating action.
    ///
    /// `url_before` is the location captured before dispatch; `timeout`
    /// overrides the configured hard bound.
    async fn wait(
        &self,
        page: &dyn LivePage,
        ctx: &ExecCtx,
        wait_for: Option<WaitFor>,
        url_before: &str,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome, ActionError>;
}

/// Default waiting strategy implementation
#[derive(Debug, Clone, Default)]
pub struct DefaultWaitStrategy {
    config: WaitConfig,
}

impl DefaultWaitStrategy {
    pub fn new(config: WaitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WaitConfig {
        &self.config
    }

    fn bound(&self, ctx: &ExecCtx, configured_ms: u64, timeout: Option<Duration>) -> Duration {
        timeout
            .unwrap_or_else(|| Duration::from_millis(configured_ms))
            .min(ctx.remaining_time())
    }

    /// Resolve once no mutation has been observed for the quiet window.
    pub async fn wait_dom_stable(
        &self,
        page: &dyn LivePage,
        ctx: &ExecCtx,
        bound: Duration,
    ) -> Result<WaitOutcome, ActionError> {
        let quiet = Duration::from_millis(self.config.dom_quiet_ms);
        let hard_deadline = Instant::now() + bound;
        let mut last_count = page.mutation_count().await?;
        let mut last_change = Instant::now();

        loop {
            let now = Instant::now();
            if now.duration_since(last_change) >= quiet {
                debug!(action_id = %ctx.action_id, "DOM stable");
                return Ok(WaitOutcome::Settled);
            }
            if now >= hard_deadline {
                debug!(
                    action_id = %ctx.action_id,
                    bound_ms = bound.as_millis() as u64,
                    "DOM still mutating at wait bound"
                );
                return Ok(WaitOutcome::TimedOut);
            }

            let until_quiet = quiet.saturating_sub(now.duration_since(last_change));
            let step = self
                .config
                .poll_interval()
                .min(until_quiet.max(Duration::from_millis(1)))
                .min(hard_deadline.saturating_duration_since(now));
            ctx.pause(step).await?;

            let count = page.mutation_count().await?;
            if count != last_count {
                last_count = count;
                last_change = Instant::now();
            }
        }
    }

    pub async fn wait_url_change(
        &self,
        page: &dyn LivePage,
        ctx: &ExecCtx,
        url_before: &str,
        bound: Duration,
    ) -> Result<WaitOutcome, ActionError> {
        let hard_deadline = Instant::now() + bound;
        loop {
            let current = page.url().await?;
            if current != url_before {
                debug!(action_id = %ctx.action_id, from = %url_before, to = %current, "URL changed");
                return Ok(WaitOutcome::Settled);
            }
            let now = Instant::now();
            if now >= hard_deadline {
                return Err(ActionError::Timeout(format!(
                    "URL did not change within {}ms",
                    bound.as_millis()
                )));
            }
            let step = self
                .config
                .poll_interval()
                .min(hard_deadline.saturating_duration_since(now));
            ctx.pause(step).await?;
        }
    }
}

#[async_trait]
impl WaitStrategy for DefaultWaitStrategy {
    async fn wait(
        &self,
        page: &dyn LivePage,
        ctx: &ExecCtx,
        wait_for: Option<WaitFor>,
        url_before: &str,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome, ActionError> {
        match wait_for {
            Some(WaitFor::DomStable) => {
                debug!(action_id = %ctx.action_id, "waitFor domStable");
                let bound = self.bound(ctx, self.config.dom_timeout_ms, timeout);
                self.wait_dom_stable(page, ctx, bound).await
            }
            Some(WaitFor::NetworkIdle) => {
                debug!(action_id = %ctx.action_id, "waitFor networkIdle");
                let bound = self.bound(ctx, self.config.dom_timeout_ms, timeout);
                let outcome = self.wait_dom_stable(page, ctx, bound).await?;
                ctx.pause(Duration::from_millis(self.config.network_settle_ms))
                    .await?;
                Ok(outcome)
            }
            Some(WaitFor::UrlChange) => {
                debug!(action_id = %ctx.action_id, "waitFor urlChange");
                let bound = self.bound(ctx, self.config.url_timeout_ms, timeout);
                self.wait_url_change(page, ctx, url_before, bound).await
            }
            None => {
                ctx.pause(Duration::from_millis(self.config.default_delay_ms))
                    .await?;
                Ok(WaitOutcome::Delayed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::FixturePage;
    use tokio_util::sync::CancellationToken;

    fn ctx(token: CancellationToken) -> ExecCtx {
        ExecCtx::new(Duration::from_secs(30), token)
    }

    #[test]
    fn test_default_wait_config() {
        let config = WaitConfig::default();
        assert_eq!(config.dom_quiet_ms, 300);
        assert_eq!(config.dom_timeout_ms, 5_000);
    }

    #[tokio::test(start_paused = true)]
    async fn dom_stable_waits_for_quiet_window() {
        let page = FixturePage::blank("https://example.test");
        let strategy = DefaultWaitStrategy::new(WaitConfig::default());
        let ctx = ctx(CancellationToken::new());

        let writer = page.clone();
        tokio::spawn(async move {
            for _ in 0..4 {
                tokio::time::sleep(Duration::from_millis(100)).await;
                writer.touch();
            }
        });

        let started = Instant::now();
        let outcome = strategy
            .wait(&page, &ctx, Some(WaitFor::DomStable), "https://example.test", None)
            .await
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Settled);
        // last mutation lands at 400ms, then 300ms of quiet
        assert!(started.elapsed() >= Duration::from_millis(700));
        assert!(started.elapsed() < Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn dom_stable_is_bounded_by_hard_timeout() {
        let page = FixturePage::blank("https://example.test");
        let strategy = DefaultWaitStrategy::new(WaitConfig::default().with_dom_timeout_ms(1_000));
        let ctx = ctx(CancellationToken::new());

        let writer = page.clone();
        let churn = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(50)).await;
                writer.touch();
            }
        });

        let started = Instant::now();
        let outcome = strategy
            .wait(&page, &ctx, Some(WaitFor::DomStable), "", None)
            .await
            .unwrap();
        churn.abort();
        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(started.elapsed() <= Duration::from_millis(1_100));
    }

    #[tokio::test(start_paused = true)]
    async fn url_change_resolves_when_location_moves() {
        let page = FixturePage::blank("https://example.test/a");
        let strategy = DefaultWaitStrategy::new(WaitConfig::default());
        let ctx = ctx(CancellationToken::new());

        let mover = page.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            mover.set_url("https://example.test/b");
        });

        let outcome = strategy
            .wait(&page, &ctx, Some(WaitFor::UrlChange), "https://example.test/a", None)
            .await
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Settled);
    }

    #[tokio::test(start_paused = true)]
    async fn url_change_times_out_with_error() {
        let page = FixturePage::blank("https://example.test/a");
        let strategy = DefaultWaitStrategy::new(WaitConfig::default());
        let ctx = ctx(CancellationToken::new());
        let err = strategy
            .wait(
                &page,
                &ctx,
                Some(WaitFor::UrlChange),
                "https://example.test/a",
                Some(Duration::from_millis(400)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Timeout(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_short_circuits_wait() {
        let page = FixturePage::blank("https://example.test");
        let strategy = DefaultWaitStrategy::new(WaitConfig::default());
        let token = CancellationToken::new();
        let ctx = ctx(token.clone());

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            canceller.cancel();
        });

        let writer = page.clone();
        let churn = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(20)).await;
                writer.touch();
            }
        });

        let err = strategy
            .wait(&page, &ctx, Some(WaitFor::DomStable), "", None)
            .await
            .unwrap_err();
        churn.abort();
        assert!(matches!(err, ActionError::Interrupted(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn default_strategy_is_a_fixed_delay() {
        let page = FixturePage::blank("https://example.test");
        let strategy = DefaultWaitStrategy::new(WaitConfig::default());
        let ctx = ctx(CancellationToken::new());
        let started = Instant::now();
        let outcome = strategy.wait(&page, &ctx, None, "", None).await.unwrap();
        assert_eq!(outcome, WaitOutcome::Delayed);
        assert!(started.elapsed() >= Duration::from_millis(150));
        assert!(started.elapsed() < Duration::from_millis(160));
    }
}

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use action_primitives::FixturePage;
use agent_core::{AgentRunner, RunPause, ScriptedModelClient, TaskOrchestrator, TaskPhase};
use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use serde::Serialize;
use tokio::fs;
use tracing::{info, warn};

use super::context::CliContext;
use super::output::OutputFormat;

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// What the agent should accomplish
    pub goal: String,

    /// Scripted model replies: a YAML or JSON list of provider payloads
    #[arg(long, value_name = "FILE")]
    pub script: PathBuf,

    /// Page fixture (YAML) the actions run against
    #[arg(long, value_name = "FILE")]
    pub page: PathBuf,

    /// Model id; selects the wire format the script is written in
    #[arg(long, short = 'm', default_value = "gpt-4o")]
    pub model: String,

    /// What to do when an action needs confirmation
    #[arg(long, value_enum, default_value = "stop")]
    pub approval: ApprovalMode,

    /// Answers to clarifying questions, used in order
    #[arg(long = "answer", value_name = "TEXT")]
    pub answers: Vec<String>,

    /// Continue past checkpoints instead of stopping
    #[arg(long)]
    pub resume_checkpoints: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ApprovalMode {
    /// Stop and report the action awaiting approval
    #[default]
    Stop,
    /// Approve every confirm-tier action
    Approve,
    /// Decline every confirm-tier action
    Decline,
}

/// Unattended answers for the pauses a run can hit.
#[derive(Debug, Default)]
pub struct Autopilot {
    pub approval: ApprovalMode,
    pub answers: VecDeque<String>,
    pub resume_checkpoints: bool,
}

impl From<&RunArgs> for Autopilot {
    fn from(args: &RunArgs) -> Self {
        Self {
            approval: args.approval,
            answers: args.answers.iter().cloned().collect(),
            resume_checkpoints: args.resume_checkpoints,
        }
    }
}

/// Run until a pause the autopilot cannot answer.
pub async fn drive(runner: &mut AgentRunner, autopilot: &mut Autopilot) -> Result<RunPause> {
    let mut pause = runner.run().await?;
    loop {
        let next = match &pause {
            RunPause::AwaitingApproval { step, verdict } => match autopilot.approval {
                ApprovalMode::Stop => None,
                mode => {
                    let approved = mode == ApprovalMode::Approve;
                    info!(
                        action = %step.action,
                        selector = %step.selector,
                        reason = %verdict.reason,
                        approved,
                        "Answering approval request"
                    );
                    Some(runner.approve_pending(approved).await?)
                }
            },
            RunPause::NeedsUser { block } => match autopilot.answers.pop_front() {
                Some(answer) => {
                    info!(question = %block.question, answer = %answer, "Answering question");
                    runner.answer(&answer)?;
                    Some(runner.run().await?)
                }
                None => None,
            },
            RunPause::Checkpoint { block } if autopilot.resume_checkpoints => {
                info!(reason = %block.reason, "Resuming past checkpoint");
                runner.resume()?;
                Some(runner.run().await?)
            }
            _ => None,
        };
        match next {
            Some(next) => pause = next,
            None => return Ok(pause),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub pause: RunPause,
    pub phase: TaskPhase,
    pub loops: u32,
    pub max_loops: u32,
    pub status: String,
    pub history_digest: String,
    pub audit_entries: usize,
}

impl RunReport {
    pub fn collect(runner: &AgentRunner, pause: RunPause) -> Self {
        let state = runner.state();
        Self {
            pause,
            phase: state.phase,
            loops: state.loop_count,
            max_loops: state.max_loops,
            status: state.status_message,
            history_digest: runner.history_digest(),
            audit_entries: runner.audit().entries().len(),
        }
    }
}

/// Runner over a fixture page and a scripted model, wired from `ctx`.
pub fn scripted_runner(
    ctx: &CliContext,
    page: FixturePage,
    model: ScriptedModelClient,
) -> Result<AgentRunner> {
    let engine = ctx.execution_engine(Arc::new(page.clone()));
    Ok(AgentRunner::new(
        TaskOrchestrator::new(ctx.config().orchestrator.clone()),
        Arc::new(model),
        Arc::new(page),
        Arc::new(engine),
        Arc::new(ctx.policy_center()?),
    )
    .with_audit(ctx.audit_trail()))
}

pub async fn cmd_run(args: RunArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let page = FixturePage::load(&args.page)
        .with_context(|| format!("loading page fixture {}", args.page.display()))?;
    let script = fs::read_to_string(&args.script)
        .await
        .with_context(|| format!("reading {}", args.script.display()))?;
    let model = ScriptedModelClient::from_yaml(args.model.clone(), &script)
        .with_context(|| format!("parsing {}", args.script.display()))?;
    info!(
        model = %args.model,
        replies = model.remaining(),
        url = %page.current_url(),
        "Starting scripted run"
    );

    let mut runner = scripted_runner(ctx, page, model)?;
    runner.start(&args.goal)?;

    let abort = runner.abort_handle();
    let interrupt = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, aborting task");
                abort.abort("Interrupted from the terminal");
            }
            Err(err) => warn!(error = %err, "Failed to listen for Ctrl-C"),
        }
    });

    let mut autopilot = Autopilot::from(&args);
    let outcome = drive(&mut runner, &mut autopilot).await;
    interrupt.abort();
    runner.audit().drain().await;

    let report = RunReport::collect(&runner, outcome?);
    output.print(&report, describe_report)
}

fn describe_report(report: &RunReport) -> String {
    let headline = match &report.pause {
        RunPause::Completed { block } => format!("Completed: {}", block.summary),
        RunPause::Checkpoint { block } => {
            format!("Checkpoint ({}): {}", block.reason, block.message)
        }
        RunPause::AwaitingApproval { step, verdict } => {
            format!("Awaiting approval for {}: {}", step.label(), verdict.reason)
        }
        RunPause::NeedsUser { block } => format!("Question for the user: {}", block.question),
        RunPause::BudgetExhausted { loops } => format!("Stopped after {loops} loops"),
        RunPause::Aborted { reason } => format!("Aborted: {reason}"),
        RunPause::Failed { status } => format!("Failed: {status}"),
    };
    let mut lines = vec![
        headline,
        format!(
            "Phase: {} | loops {}/{} | audit entries {}",
            report.phase.as_str(),
            report.loops,
            report.max_loops,
            report.audit_entries
        ),
    ];
    if !report.history_digest.is_empty() {
        lines.push(String::new());
        lines.push(report.history_digest.clone());
    }
    lines.join("\n")
}

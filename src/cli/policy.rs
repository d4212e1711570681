use anyhow::Result;
use clap::{Args, Subcommand};
use tabpilot_core_types::{ActionKind, ActionStep, RiskLevel};
use tabpilot_policy_center::{PolicySnapshot, PolicyVerdict};

use super::context::CliContext;
use super::output::OutputFormat;

#[derive(Args, Clone, Debug)]
pub struct PolicyArgs {
    #[command(subcommand)]
    pub command: PolicyCommand,
}

#[derive(Subcommand, Clone, Debug)]
pub enum PolicyCommand {
    /// Evaluate one action step against the loaded rules
    Check(PolicyCheckArgs),

    /// Print the effective rule tables and where each came from
    Show,
}

#[derive(Args, Clone, Debug)]
pub struct PolicyCheckArgs {
    /// Action name, e.g. click, input, navigate
    #[arg(long, short = 'a')]
    pub action: ActionKind,

    /// Target selector (or URL for navigate)
    #[arg(long, short = 's', default_value = "")]
    pub selector: String,

    /// Human-readable description of the target
    #[arg(long)]
    pub description: Option<String>,

    /// Value to type or select
    #[arg(long)]
    pub value: Option<String>,

    /// Declared risk (low, medium, high)
    #[arg(long, default_value = "low")]
    pub risk: RiskLevel,

    /// URL of the page the step would run on
    #[arg(long)]
    pub url: Option<String>,
}

impl PolicyCheckArgs {
    fn step(&self) -> ActionStep {
        let mut step = ActionStep::new(self.action, self.selector.clone()).with_risk(self.risk);
        if let Some(description) = &self.description {
            step = step.with_description(description.clone());
        }
        if let Some(value) = &self.value {
            step = step.with_value(value.clone());
        }
        step
    }
}

pub async fn cmd_policy(args: PolicyArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let center = ctx.policy_center()?;
    match args.command {
        PolicyCommand::Check(check) => {
            let step = check.step();
            let verdict = center.evaluate(&step, check.url.as_deref());
            output.print(&verdict, |verdict| describe_verdict(&step, verdict))
        }
        PolicyCommand::Show => {
            let snapshot = center.snapshot();
            output.print(snapshot.as_ref(), describe_snapshot)
        }
    }
}

fn describe_verdict(step: &ActionStep, verdict: &PolicyVerdict) -> String {
    let mut lines = vec![
        format!("Action:  {}", step.label()),
        format!("Tier:    {}", verdict.tier),
        format!("Reason:  {}", verdict.reason),
        format!("Risk:    {}", verdict.original_risk),
    ];
    if let Some(escalated) = verdict.escalated_risk {
        lines.push(format!("Escalated to: {escalated}"));
    }
    lines.join("\n")
}

fn describe_snapshot(snapshot: &PolicySnapshot) -> String {
    let rules = &snapshot.rules;
    let mut sources: Vec<String> = snapshot
        .provenance
        .iter()
        .map(|(table, source)| format!("{table}={source:?}"))
        .collect();
    sources.sort();
    [
        format!("Policy Revision: {}", snapshot.rev),
        format!("URL blocklist:    {} rules", rules.url_blocklist.len()),
        format!("Target blocklist: {} rules", rules.target_blocklist.len()),
        format!("Confirm list:     {} rules", rules.confirm_list.len()),
        format!("Escalations:      {} rules", rules.escalations.len()),
        format!("Sources: {}", sources.join(", ")),
    ]
    .join("\n")
}

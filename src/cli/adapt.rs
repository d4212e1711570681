use std::path::PathBuf;

use agent_core::{adapt_response, ParsedToolResult, ProviderResponse};
use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use tokio::fs;
use tracing::debug;

use super::output::OutputFormat;

#[derive(Args, Clone, Debug)]
pub struct AdaptArgs {
    /// Provider response body (JSON or YAML)
    #[arg(value_name = "FILE")]
    pub response: PathBuf,

    /// Model id; selects the OpenAI or Gemini dialect
    #[arg(long, short = 'm', default_value = "gpt-4o")]
    pub model: String,
}

pub async fn cmd_adapt(args: AdaptArgs, output: OutputFormat) -> Result<()> {
    let raw = fs::read_to_string(&args.response)
        .await
        .with_context(|| format!("reading {}", args.response.display()))?;
    let parsed = adapt_text(&args.model, &raw)?;
    debug!(model = %args.model, kind = parsed.kind(), "Adapted provider response");
    output.print(&parsed, describe)
}

/// Parse a provider body and convert its first tool call. Envelope errors
/// come back as `ParsedToolResult::Error` like any other unusable reply.
pub fn adapt_text(model: &str, raw: &str) -> Result<ParsedToolResult> {
    let value: Value = serde_yaml::from_str(raw).context("response is neither JSON nor YAML")?;
    Ok(match ProviderResponse::from_raw(model, value) {
        Ok(response) => adapt_response(&response),
        Err(err) => ParsedToolResult::error(err.to_string()),
    })
}

fn describe(parsed: &ParsedToolResult) -> String {
    match parsed {
        ParsedToolResult::Action { plan } => {
            let mut lines = vec![format!("action: {}", plan.explanation)];
            for step in &plan.actions {
                lines.push(format!(
                    "  {} (risk {}, confidence {:.2})",
                    step.label(),
                    step.risk,
                    step.confidence
                ));
            }
            lines.join("\n")
        }
        ParsedToolResult::Error { error } => format!("error: {error}"),
        other => match serde_json::to_string(other) {
            Ok(body) => format!("{}: {body}", other.kind()),
            Err(_) => other.kind().to_string(),
        },
    }
}

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use tabpilot_policy_center::load_snapshot;

use super::context::CliContext;
use super::output::OutputFormat;
use crate::config::{self, AppConfig};

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration, overrides applied
    Show,

    /// Validate a configuration file and the policy rules it points at
    Validate {
        /// File to check (defaults to the loaded configuration)
        file: Option<PathBuf>,
    },

    /// List the locations searched for a configuration file
    Paths,
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            let source = ctx
                .config_path()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "built-in defaults".to_string());
            output.print(ctx.config(), |config| {
                let body = serde_yaml::to_string(config).unwrap_or_default();
                format!("# Current configuration ({source})\n{body}")
            })
        }
        ConfigAction::Validate { file } => {
            let config = match file.as_deref().or(ctx.config_path()) {
                Some(path) => {
                    let config = AppConfig::from_file(path).await?;
                    println!("Configuration file {} is valid", path.display());
                    config
                }
                None => {
                    println!("No configuration file; defaults are valid");
                    ctx.config().clone()
                }
            };
            if let Some(rules) = &config.policy.rules_path {
                if !rules.exists() {
                    bail!("policy.rules_path {} does not exist", rules.display());
                }
                let snapshot = load_snapshot(Some(rules.as_path()))?;
                println!(
                    "Policy rules {} are valid (rev {})",
                    rules.display(),
                    snapshot.rev
                );
            }
            Ok(())
        }
        ConfigAction::Paths => {
            for path in config::candidate_paths(None) {
                let marker = if path.exists() { "found" } else { "missing" };
                println!("{marker:>8}  {}", path.display());
            }
            Ok(())
        }
    }
}

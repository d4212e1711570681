use super::adapt::cmd_adapt;
use super::config::cmd_config;
use super::env::CliArgs;
use super::native_host::cmd_native_host;
use super::policy::cmd_policy;
use super::run::cmd_run;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Run(args) => cmd_run(args, ctx, cli.output).await,
        Commands::Policy(args) => cmd_policy(args, ctx, cli.output).await,
        Commands::Adapt(args) => cmd_adapt(args, cli.output).await,
        Commands::NativeHost(args) => cmd_native_host(args, ctx).await,
        Commands::Config(args) => cmd_config(args, ctx, cli.output).await,
    }
}

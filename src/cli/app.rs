use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use super::context::CliContext;
use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::{init_logging, load_config, log_config_source};

pub async fn run() -> Result<()> {
    let cli = CliArgs::parse();

    let loaded = load_config(cli.config.as_ref()).await?;
    let logging = &loaded.config.logging;
    let level = cli.log_level.as_deref().unwrap_or(&logging.level);
    init_logging(level, cli.debug, cli.log_format.unwrap_or(logging.format))?;

    info!("Starting TabPilot v{}", env!("CARGO_PKG_VERSION"));
    log_config_source(&loaded);

    let config_path = loaded.path().cloned();
    let cli_context = CliContext::new(loaded.config, config_path);

    match dispatch(&cli, &cli_context).await {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {:#}", err);
            Err(err)
        }
    }
}

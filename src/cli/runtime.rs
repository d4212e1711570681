use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{self, AppConfig, ConfigSource, LogFormat};

/// Install the global subscriber. `RUST_LOG` wins over `level`; `debug`
/// forces DEBUG. Output goes to stderr so stdout stays free for command
/// output and the native host channel.
pub fn init_logging(level: &str, debug: bool, format: LogFormat) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string()));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    }
    .context("Failed to install tracing subscriber")?;

    Ok(())
}

pub struct LoadedConfig {
    pub config: AppConfig,
    pub source: ConfigSource,
}

impl LoadedConfig {
    pub fn path(&self) -> Option<&PathBuf> {
        match &self.source {
            ConfigSource::File(path) => Some(path),
            ConfigSource::Defaults { .. } => None,
        }
    }
}

/// Read the configuration and apply `TABPILOT_*__*` overrides. Runs before
/// logging is up, so reporting is left to [`log_config_source`].
pub async fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let (config, source) = config::load(config_path.map(PathBuf::as_path))
        .await
        .context("Failed to load configuration")?;
    let config = config
        .with_env_overrides(env::vars())
        .context("Failed to apply environment overrides")?;
    Ok(LoadedConfig { config, source })
}

pub fn log_config_source(loaded: &LoadedConfig) {
    match &loaded.source {
        ConfigSource::File(path) => info!("Loaded configuration from: {}", path.display()),
        ConfigSource::Defaults { searched } => {
            let searched: Vec<String> = searched.iter().map(|p| p.display().to_string()).collect();
            warn!(searched = ?searched, "Config file not found, using defaults");
        }
    }
}

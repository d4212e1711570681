//! Application configuration.
//!
//! One YAML document with a section per component. Every field has a
//! default, so an empty or missing file is a valid configuration.

use std::path::{Path, PathBuf};

use action_primitives::EngineConfig;
use agent_core::OrchestratorConfig;
use native_bridge::NativeConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tabpilot_policy_center::DEFAULT_AUDIT_CAPACITY;
use thiserror::Error;

/// Prefix of scalar overrides such as `TABPILOT_POLICY__AUDIT_CAPACITY=50`.
pub const ENV_PREFIX: &str = "TABPILOT_";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid override {key}: {message}")]
    Override { key: String, message: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Used when neither `RUST_LOG` nor `--log-level` is given
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    /// Rule overlay layered over the built-in tables
    pub rules_path: Option<PathBuf>,

    /// Entries kept in the in-memory audit ring
    pub audit_capacity: usize,

    /// Append every audit entry to this JSONL file
    pub audit_path: Option<PathBuf>,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            rules_path: None,
            audit_capacity: DEFAULT_AUDIT_CAPACITY,
            audit_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub orchestrator: OrchestratorConfig,
    /// Step deadline, settle delays and the `wait` strategy bounds
    pub engine: EngineConfig,
    pub policy: PolicySettings,
    pub native: NativeConfig,
}

impl AppConfig {
    pub fn from_yaml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub async fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_yaml(&content, path)
    }

    /// Apply `TABPILOT_<SECTION>__<KEY>` variables. Values parse as JSON
    /// literals and fall back to plain strings. Variables without the
    /// separator are left alone.
    pub fn with_env_overrides<I>(self, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut overrides: Vec<(String, String)> = vars
            .into_iter()
            .filter(|(key, _)| key.starts_with(ENV_PREFIX) && key.contains(ENV_SEPARATOR))
            .collect();
        if overrides.is_empty() {
            return Ok(self);
        }
        overrides.sort();

        let mut doc = serde_json::to_value(&self).map_err(|err| ConfigError::Override {
            key: String::new(),
            message: err.to_string(),
        })?;
        for (key, raw) in &overrides {
            let path: Vec<String> = key[ENV_PREFIX.len()..]
                .split(ENV_SEPARATOR)
                .filter(|segment| !segment.is_empty())
                .map(str::to_ascii_lowercase)
                .collect();
            set_json_value(&mut doc, &path, parse_env_value(raw)).map_err(|message| {
                ConfigError::Override {
                    key: key.clone(),
                    message,
                }
            })?;
        }
        serde_json::from_value(doc).map_err(|err| ConfigError::Override {
            key: overrides
                .iter()
                .map(|(key, _)| key.as_str())
                .collect::<Vec<_>>()
                .join(","),
            message: err.to_string(),
        })
    }
}

/// Where the configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults { searched: Vec<PathBuf> },
}

/// `--config` wins; otherwise the first existing candidate.
pub fn candidate_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
    if let Some(path) = explicit {
        return vec![path.to_path_buf()];
    }
    let mut paths = vec![PathBuf::from("config/tabpilot.yaml")];
    if let Some(mut dir) = dirs::config_dir() {
        dir.push("tabpilot");
        dir.push("config.yaml");
        paths.push(dir);
    }
    paths
}

/// Load from `--config` or the search path. An explicit path that does not
/// exist is an error; a missing search-path file means defaults.
pub async fn load(explicit: Option<&Path>) -> Result<(AppConfig, ConfigSource), ConfigError> {
    if let Some(path) = explicit {
        return Ok((AppConfig::from_file(path).await?, ConfigSource::File(path.to_path_buf())));
    }
    let searched = candidate_paths(None);
    for path in &searched {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            let config = AppConfig::from_file(path).await?;
            return Ok((config, ConfigSource::File(path.clone())));
        }
    }
    Ok((AppConfig::default(), ConfigSource::Defaults { searched }))
}

fn parse_env_value(raw: &str) -> JsonValue {
    serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string()))
}

fn set_json_value(target: &mut JsonValue, path: &[String], value: JsonValue) -> Result<(), String> {
    let Some((last, parents)) = path.split_last() else {
        return Err("key names no field".to_string());
    };
    let mut current = target;
    for segment in parents {
        current = ensure_object(current, segment)?
            .entry(segment.clone())
            .or_insert(JsonValue::Null);
    }
    ensure_object(current, last)?.insert(last.clone(), value);
    Ok(())
}

fn ensure_object<'a>(
    value: &'a mut JsonValue,
    segment: &str,
) -> Result<&'a mut Map<String, JsonValue>, String> {
    if value.is_null() {
        *value = JsonValue::Object(Map::new());
    }
    value
        .as_object_mut()
        .ok_or_else(|| format!("{segment} sits under a non-object value"))
}

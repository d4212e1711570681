use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::api::PolicyEngine;
use crate::defaults::default_snapshot;
use crate::errors::PolicyError;
use crate::model::{EscalationRule, PatternRule, PolicySnapshot, PolicySource};

pub const ENV_RULES_JSON: &str = "TABPILOT_POLICY_RULES_JSON";

#[derive(Debug, Default)]
pub struct LoadOptions {
    pub paths: Vec<PathBuf>,
    pub include_env: bool,
}

impl LoadOptions {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            paths: vec![path.into()],
            include_env: true,
        }
    }
}

/// Rule overlay as written in YAML or JSON. Tables that are present replace
/// the current table, or extend it when `append` is set.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RulesOverlay {
    #[serde(default)]
    pub append: bool,
    #[serde(default)]
    pub url_blocklist: Option<Vec<PatternRule>>,
    #[serde(default)]
    pub target_blocklist: Option<Vec<PatternRule>>,
    #[serde(default)]
    pub confirm_list: Option<Vec<PatternRule>>,
    #[serde(default)]
    pub escalations: Option<Vec<EscalationRule>>,
}

pub fn load_snapshot(path: Option<&Path>) -> Result<PolicySnapshot, PolicyError> {
    let mut options = LoadOptions {
        include_env: true,
        ..LoadOptions::default()
    };
    if let Some(p) = path {
        options.paths.push(p.to_path_buf());
    }
    load_snapshot_with_options(&options)
}

pub fn load_snapshot_with_options(options: &LoadOptions) -> Result<PolicySnapshot, PolicyError> {
    let mut snapshot = default_snapshot();

    for path in &options.paths {
        if path.exists() {
            let overlay = overlay_from_file(path)?;
            apply_overlay(&mut snapshot, overlay, PolicySource::File);
            debug!(path = %path.display(), "applied policy rules file");
        }
    }

    if options.include_env {
        if let Some(overlay) = overlay_from_env()? {
            apply_overlay(&mut snapshot, overlay, PolicySource::Env);
            debug!("applied {ENV_RULES_JSON}");
        }
    }

    PolicyEngine::new(&snapshot.rules)?;
    Ok(snapshot)
}

pub fn overlay_from_yaml(content: &str) -> Result<RulesOverlay, PolicyError> {
    serde_yaml::from_str(content).map_err(|err| PolicyError::Invalid(format!("{}", err)))
}

fn overlay_from_file(path: &Path) -> Result<RulesOverlay, PolicyError> {
    let content = fs::read_to_string(path).map_err(|err| PolicyError::Io(format!("{}", err)))?;
    overlay_from_yaml(&content)
}

fn overlay_from_env() -> Result<Option<RulesOverlay>, PolicyError> {
    match env::var(ENV_RULES_JSON) {
        Ok(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| PolicyError::Invalid(format!("{ENV_RULES_JSON}: {err}"))),
        _ => Ok(None),
    }
}

pub fn apply_overlay(snapshot: &mut PolicySnapshot, overlay: RulesOverlay, source: PolicySource) {
    let append = overlay.append;
    let rules = &mut snapshot.rules;
    let mut touched = Vec::new();

    if let Some(table) = overlay.url_blocklist {
        merge_table(&mut rules.url_blocklist, table, append);
        touched.push("url_blocklist");
    }
    if let Some(table) = overlay.target_blocklist {
        merge_table(&mut rules.target_blocklist, table, append);
        touched.push("target_blocklist");
    }
    if let Some(table) = overlay.confirm_list {
        merge_table(&mut rules.confirm_list, table, append);
        touched.push("confirm_list");
    }
    if let Some(table) = overlay.escalations {
        merge_table(&mut rules.escalations, table, append);
        touched.push("escalations");
    }

    if !touched.is_empty() {
        snapshot.rev = snapshot.rev.saturating_add(1);
    }
    for table in touched {
        snapshot.set_provenance(table, source);
    }
}

fn merge_table<T>(target: &mut Vec<T>, incoming: Vec<T>, append: bool) {
    if append {
        target.extend(incoming);
    } else {
        *target = incoming;
    }
}

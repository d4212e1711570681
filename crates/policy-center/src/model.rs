use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tabpilot_core_types::{ActionKind, RiskLevel};

/// Permission outcome for a proposed step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyTier {
    /// Execute without asking.
    Auto,
    /// Pause for human approval before executing.
    Confirm,
    /// Never execute.
    Block,
}

impl PolicyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyTier::Auto => "auto",
            PolicyTier::Confirm => "confirm",
            PolicyTier::Block => "block",
        }
    }

    /// Tier implied by a risk level alone.
    pub fn for_risk(risk: RiskLevel) -> Self {
        match risk {
            RiskLevel::High | RiskLevel::Medium => PolicyTier::Confirm,
            RiskLevel::Low => PolicyTier::Auto,
        }
    }
}

impl fmt::Display for PolicyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which evaluation stage produced a verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStage {
    UrlBlocklist,
    TargetBlocklist,
    ConfirmList,
    Escalation,
    Default,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyVerdict {
    pub tier: PolicyTier,
    pub reason: String,
    pub original_risk: RiskLevel,
    /// Present only when a rule changed the declared risk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalated_risk: Option<RiskLevel>,
    pub stage: PolicyStage,
}

impl PolicyVerdict {
    /// Risk after escalation, falling back to the declared one.
    pub fn effective_risk(&self) -> RiskLevel {
        self.escalated_risk.unwrap_or(self.original_risk)
    }

    pub fn is_blocked(&self) -> bool {
        self.tier == PolicyTier::Block
    }

    pub fn needs_confirmation(&self) -> bool {
        self.tier == PolicyTier::Confirm
    }
}

/// A case-insensitive regular expression plus the reason reported when it matches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRule {
    pub pattern: String,
    pub reason: String,
}

impl PatternRule {
    pub fn new(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }
}

/// Row of the risk-escalation table.
///
/// A row matches when the step's action equals `action` and, if `pattern` is
/// set, the pattern matches the step's selector or description. `force` pins
/// the risk to `escalate_to` instead of taking the maximum.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationRule {
    pub action: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    pub escalate_to: RiskLevel,
    #[serde(default)]
    pub force: bool,
    pub reason: String,
}

/// Ordered rule tables consulted by the policy engine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRules {
    #[serde(default)]
    pub url_blocklist: Vec<PatternRule>,
    #[serde(default)]
    pub target_blocklist: Vec<PatternRule>,
    #[serde(default)]
    pub confirm_list: Vec<PatternRule>,
    #[serde(default)]
    pub escalations: Vec<EscalationRule>,
}

/// Where a rule table came from after layering.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum PolicySource {
    Builtin,
    File,
    Env,
}

/// Rule tables together with per-table provenance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicySnapshot {
    pub rev: u64,
    pub rules: PolicyRules,
    pub provenance: HashMap<String, PolicySource>,
}

impl PolicySnapshot {
    pub fn builtin(rules: PolicyRules) -> Self {
        let mut snapshot = Self {
            rev: 1,
            rules,
            provenance: HashMap::new(),
        };
        for table in RULE_TABLES {
            snapshot.set_provenance(table, PolicySource::Builtin);
        }
        snapshot
    }

    pub fn set_provenance(&mut self, table: &str, source: PolicySource) {
        self.provenance.insert(table.to_string(), source);
    }
}

pub(crate) const RULE_TABLES: [&str; 4] = [
    "url_blocklist",
    "target_blocklist",
    "confirm_list",
    "escalations",
];

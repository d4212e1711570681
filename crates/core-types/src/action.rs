//! Canonical action model shared by the adapter, policy engine and executor.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ParseEnumError;

/// Confidence assigned to a step when the model does not report one.
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

/// Every action the loop can ask the executor to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Click,
    Input,
    Select,
    SelectDate,
    Scroll,
    Extract,
    Navigate,
    Eval,
    Download,
    Tabgroup,
    Native,
}

impl ActionKind {
    pub const ALL: [ActionKind; 11] = [
        ActionKind::Click,
        ActionKind::Input,
        ActionKind::Select,
        ActionKind::SelectDate,
        ActionKind::Scroll,
        ActionKind::Extract,
        ActionKind::Navigate,
        ActionKind::Eval,
        ActionKind::Download,
        ActionKind::Tabgroup,
        ActionKind::Native,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Click => "click",
            ActionKind::Input => "input",
            ActionKind::Select => "select",
            ActionKind::SelectDate => "select_date",
            ActionKind::Scroll => "scroll",
            ActionKind::Extract => "extract",
            ActionKind::Navigate => "navigate",
            ActionKind::Eval => "eval",
            ActionKind::Download => "download",
            ActionKind::Tabgroup => "tabgroup",
            ActionKind::Native => "native",
        }
    }

    /// Actions that run outside page-script scope (browser APIs or the native companion).
    pub fn is_privileged(&self) -> bool {
        matches!(
            self,
            ActionKind::SelectDate
                | ActionKind::Eval
                | ActionKind::Download
                | ActionKind::Tabgroup
                | ActionKind::Native
        )
    }

    /// Actions that never mutate the page.
    pub fn is_read_only(&self) -> bool {
        matches!(self, ActionKind::Extract)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        ActionKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ParseEnumError::new("action", s))
    }
}

/// Self-declared or escalated risk of a step. Ordered `Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    /// Parses a model-supplied risk; anything unrecognised is treated as `Low`.
    pub fn parse_lenient(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            _ => Err(ParseEnumError::new("risk", s)),
        }
    }
}

/// Post-action settle policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WaitFor {
    DomStable,
    NetworkIdle,
    UrlChange,
}

impl WaitFor {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitFor::DomStable => "domStable",
            WaitFor::NetworkIdle => "networkIdle",
            WaitFor::UrlChange => "urlChange",
        }
    }
}

impl FromStr for WaitFor {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "domStable" | "dom_stable" | "domstable" => Ok(WaitFor::DomStable),
            "networkIdle" | "network_idle" | "networkidle" => Ok(WaitFor::NetworkIdle),
            "urlChange" | "url_change" | "urlchange" => Ok(WaitFor::UrlChange),
            _ => Err(ParseEnumError::new("waitFor", s)),
        }
    }
}

/// One canonical action proposed by the model.
///
/// Steps are built once by the response adapter and then only read: the
/// policy engine and the executor both take `&ActionStep`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionStep {
    pub action: ActionKind,

    #[serde(default)]
    pub selector: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear_first: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for: Option<WaitFor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(default = "default_confidence")]
    pub confidence: f64,

    #[serde(default)]
    pub risk: RiskLevel,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

impl ActionStep {
    pub fn new(action: ActionKind, selector: impl Into<String>) -> Self {
        Self {
            action,
            selector: selector.into(),
            value: None,
            clear_first: None,
            wait_for: None,
            timeout_ms: None,
            confidence: DEFAULT_CONFIDENCE,
            risk: RiskLevel::Low,
            description: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_risk(mut self, risk: RiskLevel) -> Self {
        self.risk = risk;
        self
    }

    /// Sets the confidence, clamped into `[0, 1]`. NaN falls back to the default.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_confidence(confidence);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_wait_for(mut self, wait_for: WaitFor) -> Self {
        self.wait_for = Some(wait_for);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_clear_first(mut self, clear_first: bool) -> Self {
        self.clear_first = Some(clear_first);
        self
    }

    /// Whether the input primitive should clear the field before typing.
    pub fn should_clear_first(&self) -> bool {
        self.clear_first.unwrap_or(true)
    }

    /// Short human-readable label used in logs and history digests.
    pub fn label(&self) -> String {
        match (&self.description, self.selector.is_empty()) {
            (Some(desc), _) if !desc.trim().is_empty() => {
                format!("{} {}", self.action, desc.trim())
            }
            (_, false) => format!("{} `{}`", self.action, self.selector),
            _ => self.action.to_string(),
        }
    }
}

/// Clamps a model-reported confidence into `[0, 1]`.
pub fn clamp_confidence(raw: f64) -> f64 {
    if raw.is_nan() {
        DEFAULT_CONFIDENCE
    } else {
        raw.clamp(0.0, 1.0)
    }
}

/// The model's proposal for one loop iteration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub actions: Vec<ActionStep>,
}

impl ActionPlan {
    pub fn new(explanation: impl Into<String>, actions: Vec<ActionStep>) -> Self {
        Self {
            explanation: explanation.into(),
            actions,
        }
    }

    pub fn single(explanation: impl Into<String>, step: ActionStep) -> Self {
        Self::new(explanation, vec![step])
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_kind_round_trips_through_strings() {
        for kind in ActionKind::ALL {
            assert_eq!(kind.as_str().parse::<ActionKind>().unwrap(), kind);
        }
        assert!("hover".parse::<ActionKind>().is_err());
        assert_eq!(" Select_Date ".parse::<ActionKind>().unwrap(), ActionKind::SelectDate);
    }

    #[test]
    fn risk_ordering_and_lenient_parse() {
        assert!(RiskLevel::High > RiskLevel::Medium);
        assert!(RiskLevel::Medium > RiskLevel::Low);
        assert_eq!(RiskLevel::parse_lenient("HIGH"), RiskLevel::High);
        assert_eq!(RiskLevel::parse_lenient("catastrophic"), RiskLevel::Low);
    }

    #[test]
    fn confidence_is_clamped() {
        let step = ActionStep::new(ActionKind::Click, "#go").with_confidence(3.5);
        assert_eq!(step.confidence, 1.0);
        let step = ActionStep::new(ActionKind::Click, "#go").with_confidence(-1.0);
        assert_eq!(step.confidence, 0.0);
        let step = ActionStep::new(ActionKind::Click, "#go").with_confidence(f64::NAN);
        assert_eq!(step.confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn step_serializes_camel_case_and_skips_absent_fields() {
        let step = ActionStep::new(ActionKind::Input, "#email")
            .with_value("a@b.c")
            .with_clear_first(false)
            .with_wait_for(WaitFor::DomStable);
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["action"], "input");
        assert_eq!(json["clearFirst"], false);
        assert_eq!(json["waitFor"], "domStable");
        assert!(json.get("description").is_none());
        assert!(json.get("timeoutMs").is_none());
    }

    #[test]
    fn label_prefers_description() {
        let step = ActionStep::new(ActionKind::Click, "#buy").with_description("Buy now button");
        assert_eq!(step.label(), "click Buy now button");
        let bare = ActionStep::new(ActionKind::Scroll, "");
        assert_eq!(bare.label(), "scroll");
    }
}

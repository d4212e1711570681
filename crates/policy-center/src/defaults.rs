use tabpilot_core_types::{ActionKind, RiskLevel};

use crate::model::{EscalationRule, PatternRule, PolicyRules, PolicySnapshot};

/// Built-in rule tables. Every pattern is compiled case-insensitively.
pub fn default_rules() -> PolicyRules {
    PolicyRules {
        url_blocklist: vec![
            PatternRule::new(
                r"^(chrome|edge|brave|opera|vivaldi)://",
                "Browser-internal pages are restricted",
            ),
            PatternRule::new(
                r"^(chrome|moz)-extension://",
                "Extension pages are restricted",
            ),
            PatternRule::new(
                r"^about:(config|preferences|settings|flags|policy)",
                "Browser settings pages are restricted",
            ),
            PatternRule::new(
                r"^https://(chrome\.google\.com/webstore|chromewebstore\.google\.com)",
                "Extension store pages are restricted",
            ),
            PatternRule::new(r"^javascript:", "javascript: URLs are never automated"),
            PatternRule::new(
                r"^https?://([^/?#]*\.)?(paypal|venmo|stripe|wise|revolut|chase|wellsfargo|bankofamerica|citi|hsbc|barclays)\.com([/:?#]|$)",
                "Banking and payment sites are restricted",
            ),
            PatternRule::new(
                r"^https?://[^/?#]*bank[^/?#]*([/:?#]|$)",
                "Banking sites are restricted",
            ),
        ],
        target_blocklist: vec![
            PatternRule::new(
                r#"type\s*=\s*["']?password|\bpassword\b|\bpasswd\b|\bpwd\b"#,
                "Password fields are never automated",
            ),
            PatternRule::new(
                r#"credit[-_ ]?card|card[-_ ]?(number|num|no)\b|\bcc-?(number|num|exp|csc|cvc)\b|\bcvv\b|\bcvc\b|autocomplete\s*=\s*["']?cc-|payment[-_ ]?(method|card|details|info)"#,
                "Payment card elements are never automated",
            ),
            PatternRule::new(
                r#"\botp\b|one[-_ ]?time[-_ ]?(code|password|passcode)|\b2fa\b|\bmfa\b|\btotp\b|verification[-_ ]?code|autocomplete\s*=\s*["']?one-time-code"#,
                "One-time codes and MFA fields are never automated",
            ),
            PatternRule::new(
                r"(delete|close|deactivate|terminate)[-_ ]?(my[-_ ]?)?account",
                "Account deletion controls are never automated",
            ),
        ],
        confirm_list: vec![
            PatternRule::new(
                r"\b(delete|remove)",
                "Destructive action requires confirmation",
            ),
            PatternRule::new(r"\bcancel", "Cancellation requires confirmation"),
            PatternRule::new(r"\bsubmit", "Form submission requires confirmation"),
            PatternRule::new(
                r"\blog[-_ ]?out|\bsign[-_ ]?out",
                "Ending the session requires confirmation",
            ),
        ],
        escalations: vec![
            EscalationRule {
                action: ActionKind::Navigate,
                pattern: None,
                escalate_to: RiskLevel::Low,
                force: true,
                reason: "Navigation is handled by the privileged channel".to_string(),
            },
            EscalationRule {
                action: ActionKind::Click,
                pattern: Some(r"\b(destroy|erase|wipe|purge|discard|revoke|reset)".to_string()),
                escalate_to: RiskLevel::High,
                force: false,
                reason: "Click on a destructive control".to_string(),
            },
            EscalationRule {
                action: ActionKind::Input,
                pattern: Some(
                    r"\b(user(name)?|login|e-?mail|account|ssn|social[-_ ]?security|api[-_ ]?key|token|secret)"
                        .to_string(),
                ),
                escalate_to: RiskLevel::Medium,
                force: false,
                reason: "Typing into a credential field".to_string(),
            },
            EscalationRule {
                action: ActionKind::Click,
                pattern: Some(
                    r"\b(buy|purchase|order|checkout|check-out|pay|subscribe|donate)".to_string(),
                ),
                escalate_to: RiskLevel::High,
                force: false,
                reason: "Click may complete a purchase".to_string(),
            },
            EscalationRule {
                action: ActionKind::Eval,
                pattern: None,
                escalate_to: RiskLevel::High,
                force: false,
                reason: "Script evaluation runs arbitrary code".to_string(),
            },
            EscalationRule {
                action: ActionKind::Download,
                pattern: None,
                escalate_to: RiskLevel::Medium,
                force: false,
                reason: "Downloads write to the local filesystem".to_string(),
            },
            EscalationRule {
                action: ActionKind::Native,
                pattern: None,
                escalate_to: RiskLevel::Medium,
                force: false,
                reason: "Native companion operations leave the browser sandbox".to_string(),
            },
        ],
    }
}

pub fn default_snapshot() -> PolicySnapshot {
    PolicySnapshot::builtin(default_rules())
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use regex::{Regex, RegexBuilder};
use tabpilot_core_types::{ActionKind, ActionStep, RiskLevel};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::defaults::default_snapshot;
use crate::errors::PolicyError;
use crate::model::{
    PatternRule, PolicyRules, PolicySnapshot, PolicySource, PolicyStage, PolicyTier,
    PolicyVerdict, RULE_TABLES,
};

struct CompiledPattern {
    regex: Regex,
    reason: String,
}

struct CompiledEscalation {
    action: ActionKind,
    regex: Option<Regex>,
    escalate_to: RiskLevel,
    force: bool,
    reason: String,
}

/// Compiled rule tables. `evaluate` is a pure function of its inputs, so one
/// engine can be shared freely across tasks and threads.
pub struct PolicyEngine {
    url_blocklist: Vec<CompiledPattern>,
    target_blocklist: Vec<CompiledPattern>,
    confirm_list: Vec<CompiledPattern>,
    escalations: Vec<CompiledEscalation>,
}

impl std::fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEngine")
            .field("url_blocklist", &self.url_blocklist.len())
            .field("target_blocklist", &self.target_blocklist.len())
            .field("confirm_list", &self.confirm_list.len())
            .field("escalations", &self.escalations.len())
            .finish()
    }
}

impl PolicyEngine {
    pub fn new(rules: &PolicyRules) -> Result<Self, PolicyError> {
        Ok(Self {
            url_blocklist: compile_table(&rules.url_blocklist)?,
            target_blocklist: compile_table(&rules.target_blocklist)?,
            confirm_list: compile_table(&rules.confirm_list)?,
            escalations: rules
                .escalations
                .iter()
                .map(|rule| {
                    Ok(CompiledEscalation {
                        action: rule.action,
                        regex: rule.pattern.as_deref().map(compile).transpose()?,
                        escalate_to: rule.escalate_to,
                        force: rule.force,
                        reason: rule.reason.clone(),
                    })
                })
                .collect::<Result<Vec<_>, PolicyError>>()?,
        })
    }

    /// Engine over the built-in rule tables.
    pub fn with_defaults() -> Result<Self, PolicyError> {
        Self::new(&default_snapshot().rules)
    }

    /// Decide the permission tier for `step` on the page at `page_url`.
    ///
    /// Stages run in strict priority order and the first match wins: URL
    /// blocklist (skipped for `navigate`), target blocklist, confirm list,
    /// risk escalation table, then the step's own declared risk.
    pub fn evaluate(&self, step: &ActionStep, page_url: Option<&str>) -> PolicyVerdict {
        let declared = step.risk;

        if step.action != ActionKind::Navigate {
            if let Some(url) = page_url {
                if let Some(rule) = first_match(&self.url_blocklist, url) {
                    return verdict(
                        PolicyTier::Block,
                        &rule.reason,
                        declared,
                        declared,
                        PolicyStage::UrlBlocklist,
                    );
                }
            }
        }

        let target = target_text(step);
        if let Some(rule) = first_match(&self.target_blocklist, &target) {
            return verdict(
                PolicyTier::Block,
                &rule.reason,
                declared,
                declared,
                PolicyStage::TargetBlocklist,
            );
        }

        if let Some(rule) = first_match(&self.confirm_list, &target) {
            let risk = declared.max(RiskLevel::Medium);
            return verdict(
                PolicyTier::Confirm,
                &rule.reason,
                declared,
                risk,
                PolicyStage::ConfirmList,
            );
        }

        for rule in &self.escalations {
            if rule.action != step.action {
                continue;
            }
            let matched = rule
                .regex
                .as_ref()
                .map(|regex| regex.is_match(&target))
                .unwrap_or(true);
            if !matched {
                continue;
            }
            let risk = if rule.force {
                rule.escalate_to
            } else {
                declared.max(rule.escalate_to)
            };
            return verdict(
                PolicyTier::for_risk(risk),
                &rule.reason,
                declared,
                risk,
                PolicyStage::Escalation,
            );
        }

        verdict(
            PolicyTier::for_risk(declared),
            &format!("Declared {} risk", declared),
            declared,
            declared,
            PolicyStage::Default,
        )
    }
}

fn compile(pattern: &str) -> Result<Regex, PolicyError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|err| PolicyError::InvalidPattern {
            pattern: pattern.to_string(),
            message: err.to_string(),
        })
}

fn compile_table(table: &[PatternRule]) -> Result<Vec<CompiledPattern>, PolicyError> {
    table
        .iter()
        .map(|rule| {
            Ok(CompiledPattern {
                regex: compile(&rule.pattern)?,
                reason: rule.reason.clone(),
            })
        })
        .collect()
}

fn first_match<'a>(table: &'a [CompiledPattern], haystack: &str) -> Option<&'a CompiledPattern> {
    table.iter().find(|rule| rule.regex.is_match(haystack))
}

fn target_text(step: &ActionStep) -> String {
    match step.description.as_deref() {
        Some(description) if !description.trim().is_empty() => {
            format!("{} {}", step.selector, description)
        }
        _ => step.selector.clone(),
    }
}

fn verdict(
    tier: PolicyTier,
    reason: &str,
    declared: RiskLevel,
    effective: RiskLevel,
    stage: PolicyStage,
) -> PolicyVerdict {
    PolicyVerdict {
        tier,
        reason: reason.to_string(),
        original_risk: declared,
        escalated_risk: (effective != declared).then_some(effective),
        stage,
    }
}

/// Holds the active rule snapshot and its compiled engine, swappable at runtime.
pub struct PolicyCenter {
    engine: ArcSwap<PolicyEngine>,
    snapshot: ArcSwap<PolicySnapshot>,
    rev_counter: AtomicU64,
    watch_tx: watch::Sender<Arc<PolicySnapshot>>,
}

impl PolicyCenter {
    pub fn new(snapshot: PolicySnapshot) -> Result<Self, PolicyError> {
        let engine = PolicyEngine::new(&snapshot.rules)?;
        let rev_counter = AtomicU64::new(snapshot.rev);
        let snapshot = Arc::new(snapshot);
        let (watch_tx, _watch_rx) = watch::channel(Arc::clone(&snapshot));
        Ok(Self {
            engine: ArcSwap::from_pointee(engine),
            snapshot: ArcSwap::from(snapshot),
            rev_counter,
            watch_tx,
        })
    }

    pub fn with_defaults() -> Result<Self, PolicyError> {
        Self::new(default_snapshot())
    }

    pub fn engine(&self) -> Arc<PolicyEngine> {
        self.engine.load_full()
    }

    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        self.snapshot.load_full()
    }

    pub fn revision(&self) -> u64 {
        self.snapshot.load().rev
    }

    pub fn evaluate(&self, step: &ActionStep, page_url: Option<&str>) -> PolicyVerdict {
        let verdict = self.engine.load().evaluate(step, page_url);
        debug!(
            action = %step.action,
            selector = %step.selector,
            tier = %verdict.tier,
            stage = ?verdict.stage,
            "Policy verdict"
        );
        verdict
    }

    /// Replace every rule table. The previous engine stays active if any
    /// pattern fails to compile.
    pub fn replace_rules(
        &self,
        rules: PolicyRules,
        source: PolicySource,
    ) -> Result<u64, PolicyError> {
        let engine = PolicyEngine::new(&rules)?;
        let rev = self.rev_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let mut snapshot = PolicySnapshot {
            rev,
            rules,
            provenance: self.snapshot.load().provenance.clone(),
        };
        for table in RULE_TABLES {
            snapshot.set_provenance(table, source);
        }
        let snapshot = Arc::new(snapshot);
        self.engine.store(Arc::new(engine));
        self.snapshot.store(Arc::clone(&snapshot));
        info!(rev, ?source, "Policy rules replaced");
        self.watch_tx.send_replace(snapshot);
        Ok(rev)
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<PolicySnapshot>> {
        self.watch_tx.subscribe()
    }
}

//! Safety policy for proposed browser actions.
//!
//! [`PolicyEngine::evaluate`] maps an [`ActionStep`](tabpilot_core_types::ActionStep)
//! plus the current page URL to a [`PolicyVerdict`] using ordered, data-driven
//! rule tables. [`PolicyCenter`] makes the active tables swappable at runtime and
//! [`AuditTrail`] keeps a bounded record of every decision.

pub mod api;
pub mod audit;
pub mod defaults;
pub mod errors;
pub mod loader;
pub mod model;

pub use api::{PolicyCenter, PolicyEngine};
pub use audit::{
    AuditEntry, AuditLog, AuditOutcome, AuditSink, AuditTrail, JsonlAuditSink, MemoryAuditSink,
    DEFAULT_AUDIT_CAPACITY,
};
pub use defaults::{default_rules, default_snapshot};
pub use errors::PolicyError;
pub use loader::{load_snapshot, load_snapshot_with_options, LoadOptions, RulesOverlay};
pub use model::{
    EscalationRule, PatternRule, PolicyRules, PolicySnapshot, PolicySource, PolicyStage,
    PolicyTier, PolicyVerdict,
};

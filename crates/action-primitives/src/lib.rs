//! Action Execution Engine
//!
//! Runs one canonical [`ActionStep`](tabpilot_core_types::ActionStep) against a
//! live page and reports an [`ExecutionResult`](tabpilot_core_types::ExecutionResult):
//! - page-script primitives: click, input, select, scroll, extract, navigate
//! - privileged actions validated here and routed to registered handlers
//! - post-action wait strategies: domStable, networkIdle, urlChange, fixed delay
//! - an in-memory fixture page for tests and scripted runs

mod engine;
pub mod errors;
pub mod fixture;
mod page;
mod primitives;
pub mod types;
mod waiting;

pub use engine::*;
pub use errors::*;
pub use fixture::{ClickEffect, ConsoleLine, FixtureElement, FixturePage, PageFixture, RecordedEvent};
pub use page::*;
pub use primitives::*;
pub use types::*;
pub use waiting::*;

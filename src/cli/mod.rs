pub mod adapt;
pub mod app;
pub mod commands;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod native_host;
pub mod output;
pub mod policy;
pub mod run;
pub mod runtime;

pub use adapt::{adapt_text, AdaptArgs};
pub use context::CliContext;
pub use env::CliArgs;
pub use output::OutputFormat;
pub use run::{drive, scripted_runner, ApprovalMode, Autopilot, RunReport};

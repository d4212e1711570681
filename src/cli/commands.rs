use clap::Subcommand;

use super::adapt::AdaptArgs;
use super::config::ConfigArgs;
use super::native_host::NativeHostArgs;
use super::policy::PolicyArgs;
use super::run::RunArgs;

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Drive a scripted task against a page fixture
    Run(RunArgs),

    /// Evaluate steps against the safety policy
    Policy(PolicyArgs),

    /// Convert a provider response into the canonical tool result
    Adapt(AdaptArgs),

    /// Serve the native companion over stdin/stdout
    NativeHost(NativeHostArgs),

    /// Inspect the TabPilot configuration
    Config(ConfigArgs),
}

//! Agent core: the model-driven loop that operates a live tab.
//!
//! Provides the task orchestrator, the provider response adapter, the model
//! and page-observer seams, and the runner that wires them to policy and the
//! action engine.

pub mod adapter;
pub mod agent_loop;
pub mod errors;
pub mod llm_provider;
pub mod model;
pub mod observer;
pub mod session;

pub use adapter::{
    adapt_response, encode_action, first_invocation, tool_definitions, tool_history_records,
    user_message, ParsedToolResult, ProviderResponse, ToolInvocation, WireFormat,
};
pub use agent_loop::{
    AbortHandle, AgentRunner, DefaultPromptAssembler, OrchestratorConfig, PageSnapshot,
    PromptAssembler, RunPause, TaskOrchestrator, TaskPhase, TaskState,
};
pub use errors::AgentError;
pub use llm_provider::{ModelClient, ScriptedModelClient, ScriptedReply};
pub use model::ModelRequest;
pub use observer::{ConsoleMessage, PageObserver};
pub use session::{SessionBuffers, SessionEvent, SessionEventKind};

pub mod args;
pub mod conversation;
pub mod provider;
pub mod registry;
pub mod runtime;
pub mod session;
pub mod tool;
pub mod tools;

pub use args::{PathDictionary, ToolArgs};
pub use conversation::{Conversation, ModelPart, ModelTurn, Turn};
pub use provider::{LlmError, ModelBackend};
pub use registry::{RegistryError, ToolRegistry};
pub use repoctx_core::ToolCallPolicy;
pub use runtime::{Orchestrator, OrchestratorError, RunOutput, Stage};
pub use session::{SessionConnector, SessionError, ToolOutput, ToolSession};
pub use tool::{Tool, ToolCall, ToolContext, ToolDefinition, ToolError, ToolResult};
pub use tools::{
    BrowseFolderTool, CheckoutGitRepoTool, CombinePathDictionaryTool, ServerStatusTool,
};

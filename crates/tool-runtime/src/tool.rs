use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

use crate::args::ToolArgs;

/// Describes a tool's interface for LLM consumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name (e.g., "browse_folder")
    pub name: String,
    /// Human-readable description for the LLM
    pub description: String,
    /// JSON Schema describing the expected input
    pub input_schema: Value,
}

/// Represents the model requesting execution of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique ID for this invocation (used to match results)
    pub id: String,
    /// Tool name to execute
    pub name: String,
    /// JSON input arguments
    pub input: Value,
}

/// Result of executing a tool, sent back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Must match the ToolCall id
    pub tool_call_id: String,
    /// Name of the tool that produced this result
    pub name: String,
    /// Result content (JSON text on success, error description on failure)
    pub content: String,
    /// Whether this result represents an error
    pub is_error: bool,
}

impl ToolResult {
    /// The content parsed as JSON, or as a plain string when it is not JSON.
    pub fn payload(&self) -> Value {
        serde_json::from_str(&self.content).unwrap_or_else(|_| Value::String(self.content.clone()))
    }
}

/// Context passed to tool execution.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Base for relative paths
    pub working_directory: PathBuf,
    /// Parent directory for clones and combined artifacts
    pub scratch_dir: PathBuf,
}

impl ToolContext {
    pub fn new(working_directory: PathBuf, scratch_dir: PathBuf) -> Self {
        Self {
            working_directory,
            scratch_dir,
        }
    }

    /// Resolve a possibly relative path against the working directory.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let candidate = PathBuf::from(path);
        if candidate.is_absolute() {
            candidate
        } else {
            self.working_directory.join(candidate)
        }
    }
}

/// The primary extension point: all tools implement this trait.
///
/// Tools receive arguments that were already validated against their
/// schema and return a structured JSON payload.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool's definition (name, description, JSON Schema).
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with validated arguments.
    async fn execute(&self, args: ToolArgs, context: &ToolContext) -> Result<Value, ToolError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

impl ToolError {
    /// Error for a tool receiving arguments that belong to another tool.
    pub(crate) fn mismatched(expected: &str, args: &ToolArgs) -> Self {
        ToolError::InvalidInput(format!(
            "tool '{}' received arguments for '{}'",
            expected,
            args.tool_name()
        ))
    }
}

impl fmt::Display for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_parses_json_content() {
        let result = ToolResult {
            tool_call_id: "call_1".to_string(),
            name: "server_status".to_string(),
            content: r#"{"status":"online"}"#.to_string(),
            is_error: false,
        };
        assert_eq!(result.payload()["status"], "online");
    }

    #[test]
    fn test_payload_falls_back_to_string() {
        let result = ToolResult {
            tool_call_id: "call_2".to_string(),
            name: "browse_folder".to_string(),
            content: "Invalid input: missing field `path`".to_string(),
            is_error: true,
        };
        assert_eq!(
            result.payload(),
            Value::String("Invalid input: missing field `path`".to_string())
        );
    }

    #[test]
    fn test_context_resolve() {
        let ctx = ToolContext::new(PathBuf::from("/work"), PathBuf::from("/tmp"));
        assert_eq!(ctx.resolve("src"), PathBuf::from("/work/src"));
        assert_eq!(ctx.resolve("/abs/dir"), PathBuf::from("/abs/dir"));
    }

    #[test]
    fn test_definition_display() {
        let def = ToolDefinition {
            name: "server_status".to_string(),
            description: "Liveness check".to_string(),
            input_schema: serde_json::json!({"type": "object"}),
        };
        assert_eq!(def.to_string(), "server_status(Liveness check)");
    }
}

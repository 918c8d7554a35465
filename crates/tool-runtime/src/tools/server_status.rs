use async_trait::async_trait;
use serde_json::Value;

use crate::args::{ToolArgs, SERVER_STATUS};
use crate::tool::{Tool, ToolContext, ToolDefinition, ToolError};

/// Liveness check for the tool server.
pub struct ServerStatusTool;

#[async_trait]
impl Tool for ServerStatusTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: SERVER_STATUS.to_string(),
            description: "Check that the tool server is running. Takes no arguments.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }

    async fn execute(&self, args: ToolArgs, _context: &ToolContext) -> Result<Value, ToolError> {
        let ToolArgs::ServerStatus(_) = args else {
            return Err(ToolError::mismatched(SERVER_STATUS, &args));
        };
        Ok(serde_json::json!({
            "status": "online",
            "message": "repoctx tool server is running"
        }))
    }
}

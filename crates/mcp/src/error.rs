//! Error types for the MCP crate.

use repoctx_tool_runtime::SessionError;

use crate::types::{error_codes, JsonRpcError};

#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// The peer answered with a JSON-RPC error object.
    #[error("Remote error {code}: {message}")]
    Remote { code: i64, message: String },

    /// The server process exited or closed its end of the transport.
    #[error("Server unavailable: {0}")]
    ServerUnavailable(String),
}

impl McpError {
    /// Convert to a JSON-RPC error object.
    pub fn to_rpc_error(&self) -> JsonRpcError {
        let code = match self {
            McpError::JsonParse(_) => error_codes::PARSE_ERROR,
            McpError::MethodNotFound(_) => error_codes::METHOD_NOT_FOUND,
            McpError::InvalidParams(_) | McpError::ToolNotFound(_) => error_codes::INVALID_PARAMS,
            McpError::Remote { code, .. } => *code,
            _ => error_codes::INTERNAL_ERROR,
        };
        JsonRpcError {
            code,
            message: self.to_string(),
            data: None,
        }
    }
}

impl From<JsonRpcError> for McpError {
    fn from(err: JsonRpcError) -> Self {
        McpError::Remote {
            code: err.code,
            message: err.message,
        }
    }
}

impl From<McpError> for SessionError {
    fn from(err: McpError) -> Self {
        match err {
            McpError::Transport(e) => SessionError::Transport(e.to_string()),
            McpError::ServerUnavailable(reason) => SessionError::Transport(reason),
            other => SessionError::Protocol(other.to_string()),
        }
    }
}

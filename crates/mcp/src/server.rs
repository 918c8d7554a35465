//! MCP server implementation.
//!
//! Wraps a `ToolRegistry` and exposes its tools over the MCP protocol.
//! Tool failures, including arguments that do not fit a tool's schema, are
//! answered with an `isError` result so the model can see them; only an
//! unknown tool name is a protocol error.

use serde_json::Value;
use tracing::{debug, info, warn};

use repoctx_tool_runtime::{ToolContext, ToolError, ToolRegistry};

use crate::error::McpError;
use crate::transport::McpTransport;
use crate::types::*;

/// MCP server that bridges a `ToolRegistry` to MCP clients.
pub struct McpServer {
    registry: ToolRegistry,
    context: ToolContext,
    server_name: String,
    server_version: String,
    initialized: bool,
}

impl McpServer {
    pub fn new(registry: ToolRegistry, context: ToolContext) -> Self {
        Self {
            registry,
            context,
            server_name: "repoctx".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Serve requests until the transport is closed.
    pub async fn run<T: McpTransport + ?Sized>(&mut self, transport: &mut T) -> Result<(), McpError> {
        info!(server = %self.server_name, tools = self.registry.len(), "MCP server starting");

        while let Some(line) = transport.receive().await? {
            debug!(message = %line, "received");
            if let Some(response) = self.handle_line(&line).await {
                let json = serde_json::to_string(&response)?;
                debug!(response = %json, "sending");
                transport.send(&json).await?;
            }
        }

        info!("transport closed, shutting down");
        Ok(())
    }

    /// Handle one raw message. Notifications produce no response.
    pub async fn handle_line(&mut self, line: &str) -> Option<JsonRpcResponse> {
        let raw: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "failed to parse JSON");
                return Some(error_response(RpcId::Null, McpError::JsonParse(e)));
            }
        };

        if raw.get("id").is_none() {
            match serde_json::from_value::<JsonRpcNotification>(raw) {
                Ok(notification) => self.handle_notification(&notification),
                Err(e) => debug!(error = %e, "ignoring malformed notification"),
            }
            return None;
        }

        let id = raw
            .get("id")
            .cloned()
            .and_then(|id| serde_json::from_value::<RpcId>(id).ok())
            .unwrap_or(RpcId::Null);

        match serde_json::from_value::<JsonRpcRequest>(raw) {
            Ok(request) => Some(self.handle_request(&request).await),
            Err(e) => {
                warn!(error = %e, "invalid JSON-RPC request");
                Some(JsonRpcResponse::error(
                    id,
                    error_codes::INVALID_REQUEST,
                    format!("Invalid request: {e}"),
                ))
            }
        }
    }

    /// Handle a single JSON-RPC request and produce a response.
    pub async fn handle_request(&mut self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();
        let outcome = match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(&request.params),
            methods::TOOLS_LIST => self.handle_list_tools(),
            methods::TOOLS_CALL => self.handle_call_tool(&request.params).await,
            method => {
                warn!(method, "unknown method");
                Err(McpError::MethodNotFound(method.to_string()))
            }
        };

        match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => error_response(id, e),
        }
    }

    fn handle_notification(&mut self, notification: &JsonRpcNotification) {
        match notification.method.as_str() {
            methods::INITIALIZED => info!("client confirmed initialization"),
            methods::CANCELLED => debug!("client cancelled a request"),
            method => debug!(method, "unknown notification, ignoring"),
        }
    }

    fn handle_initialize(&mut self, params: &Option<Value>) -> Result<Value, McpError> {
        if let Some(params) = params {
            match serde_json::from_value::<InitializeParams>(params.clone()) {
                Ok(p) => info!(
                    client = %p.client_info.name,
                    protocol = %p.protocol_version,
                    "initialize"
                ),
                Err(e) => debug!(error = %e, "unrecognised initialize params"),
            }
        }
        self.initialized = true;

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
            },
            server_info: Implementation {
                name: self.server_name.clone(),
                version: Some(self.server_version.clone()),
            },
        };
        Ok(serde_json::to_value(result)?)
    }

    fn handle_list_tools(&self) -> Result<Value, McpError> {
        let tools: Vec<ToolInfo> = self.registry.list().into_iter().map(ToolInfo::from).collect();
        debug!(count = tools.len(), "tools/list");
        Ok(serde_json::to_value(ListToolsResult { tools })?)
    }

    async fn handle_call_tool(&self, params: &Option<Value>) -> Result<Value, McpError> {
        let params = params
            .clone()
            .ok_or_else(|| McpError::InvalidParams("missing params".to_string()))?;
        let call: CallToolParams =
            serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))?;

        info!(tool = %call.name, "tools/call");
        let result = match self
            .registry
            .invoke(&call.name, call.arguments, &self.context)
            .await
        {
            Ok(payload) => CallToolResult::json(&payload),
            Err(ToolError::UnknownTool(name)) => return Err(McpError::ToolNotFound(name)),
            Err(e) => {
                warn!(tool = %call.name, error = %e, "tool failed");
                CallToolResult::failure(e.to_string())
            }
        };
        Ok(serde_json::to_value(result)?)
    }
}

fn error_response(id: RpcId, err: McpError) -> JsonRpcResponse {
    let rpc = err.to_rpc_error();
    JsonRpcResponse::error(id, rpc.code, rpc.message)
}

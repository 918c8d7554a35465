//! MCP client implementation.
//!
//! Spawns the tool server as a subordinate process, performs the MCP
//! handshake, discovers tools, and serves as the orchestrator's
//! [`ToolSession`]. The child is spawned with `kill_on_drop`, so dropping
//! a client (for instance when a run is cancelled) always stops the server.

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use repoctx_core::Config;
use repoctx_tool_runtime::{
    SessionConnector, SessionError, ToolDefinition, ToolOutput, ToolSession,
};

use crate::error::McpError;
use crate::transport::{ChildTransport, McpTransport};
use crate::types::*;

/// How long `close` waits for the server to exit after its stdin closes.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Command line, working directory and environment of the tool server.
#[derive(Debug, Clone)]
pub struct ServerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub envs: Vec<(String, String)>,
}

impl ServerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// The configured server command. The model API key and scratch
    /// directory are passed through the child's environment.
    pub fn from_config(config: &Config) -> Self {
        let server = &config.server;
        let mut command = Self::new(&server.command)
            .current_dir(&server.working_dir)
            .env("REPOCTX_SCRATCH_DIR", server.scratch_dir.to_string_lossy());
        command.args.extend(server.args.iter().cloned());
        if let Some(key) = &config.gemini.api_key {
            command = command.env("GEMINI_API_KEY", key);
        }
        command
    }

    fn spawn(&self) -> std::io::Result<Child> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd.spawn()
    }
}

/// An MCP client session with a tool server.
pub struct McpClient {
    transport: Option<Box<dyn McpTransport>>,
    child: Option<Child>,
    next_id: i64,
    server_info: Option<Implementation>,
    tools: Vec<ToolInfo>,
}

impl McpClient {
    /// Spawn the server process and complete the handshake.
    pub async fn spawn(command: &ServerCommand) -> Result<Self, SessionError> {
        info!(program = %command.program.display(), "spawning tool server");
        let mut child = command.spawn().map_err(|e| {
            SessionError::Spawn(format!("{}: {}", command.program.display(), e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SessionError::Spawn("failed to capture server stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SessionError::Spawn("failed to capture server stdout".to_string()))?;

        let mut client = Self::unconnected(Box::new(ChildTransport::child(stdout, stdin)));
        client.child = Some(child);
        client.handshake().await?;
        Ok(client)
    }

    /// Connect over an existing transport and complete the handshake.
    pub async fn connect(transport: impl McpTransport + 'static) -> Result<Self, SessionError> {
        let mut client = Self::unconnected(Box::new(transport));
        client.handshake().await?;
        Ok(client)
    }

    fn unconnected(transport: Box<dyn McpTransport>) -> Self {
        Self {
            transport: Some(transport),
            child: None,
            next_id: 1,
            server_info: None,
            tools: Vec::new(),
        }
    }

    async fn handshake(&mut self) -> Result<(), SessionError> {
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "repoctx-client",
                "version": env!("CARGO_PKG_VERSION")
            }
        });

        let result = self
            .request(methods::INITIALIZE, Some(params))
            .await
            .map_err(|e| SessionError::Handshake(e.to_string()))?;
        let init: InitializeResult = serde_json::from_value(result)
            .map_err(|e| SessionError::Handshake(format!("bad initialize result: {e}")))?;
        if init.protocol_version != PROTOCOL_VERSION {
            warn!(server = %init.protocol_version, client = PROTOCOL_VERSION, "protocol version differs");
        }
        self.server_info = Some(init.server_info);

        self.notify(methods::INITIALIZED, None)
            .await
            .map_err(|e| SessionError::Handshake(e.to_string()))?;

        let result = self.request(methods::TOOLS_LIST, None).await?;
        let listed: ListToolsResult = serde_json::from_value(result).map_err(McpError::from)?;
        self.tools = listed.tools;

        info!(
            server = self.server_info.as_ref().map(|s| s.name.as_str()).unwrap_or("?"),
            tools = self.tools.len(),
            "tool session ready"
        );
        Ok(())
    }

    fn transport(&mut self) -> Result<&mut Box<dyn McpTransport>, McpError> {
        self.transport
            .as_mut()
            .ok_or_else(|| McpError::ServerUnavailable("session closed".to_string()))
    }

    /// Send a request and wait for the response carrying its id.
    async fn request(&mut self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let id = self.next_id;
        self.next_id += 1;

        let json = serde_json::to_string(&JsonRpcRequest::new(RpcId::Number(id), method, params))?;
        debug!(method, id, "sending request");
        let transport = self.transport()?;
        transport.send(&json).await?;

        loop {
            let line = transport.receive().await?.ok_or_else(|| {
                McpError::ServerUnavailable("server closed the connection".to_string())
            })?;
            let response: JsonRpcResponse = match serde_json::from_str(&line) {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "skipping non-response message");
                    continue;
                }
            };
            if response.id != RpcId::Number(id) {
                warn!(expected = id, got = ?response.id, "skipping response for another request");
                continue;
            }
            if let Some(err) = response.error {
                return Err(err.into());
            }
            return Ok(response.result.unwrap_or(Value::Null));
        }
    }

    async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let json = serde_json::to_string(&JsonRpcNotification::new(method, params))?;
        self.transport()?.send(&json).await
    }

    /// Call a tool. Server-side tool failures and rejected arguments come
    /// back as failed outputs; transport failures are errors.
    pub async fn call(&mut self, name: &str, arguments: Value) -> Result<ToolOutput, McpError> {
        let params = serde_json::json!({ "name": name, "arguments": arguments });
        match self.request(methods::TOOLS_CALL, Some(params)).await {
            Ok(result) => Ok(serde_json::from_value::<CallToolResult>(result)?.into()),
            Err(McpError::Remote { code, message }) if code == error_codes::INVALID_PARAMS => {
                Ok(ToolOutput::failure(message))
            }
            Err(e) => Err(e),
        }
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().cloned().map(ToolDefinition::from).collect()
    }

    pub fn server_info(&self) -> Option<&Implementation> {
        self.server_info.as_ref()
    }

    /// OS process id of the spawned server, if this client owns one.
    pub fn process_id(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Close stdin and wait for the server to exit, killing it after a grace period.
    pub async fn shutdown(&mut self) -> Result<(), McpError> {
        self.transport = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
            Ok(Ok(status)) => info!(%status, "tool server exited"),
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                warn!("tool server did not exit, killing");
                child.kill().await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ToolSession for McpClient {
    async fn list_tools(&mut self) -> Result<Vec<ToolDefinition>, SessionError> {
        if self.transport.is_none() {
            return Err(SessionError::Closed);
        }
        Ok(self.tool_definitions())
    }

    async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<ToolOutput, SessionError> {
        Ok(self.call(name, arguments).await?)
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        Ok(self.shutdown().await?)
    }
}

/// Spawns a fresh tool server per run.
pub struct McpConnector {
    command: ServerCommand,
}

impl McpConnector {
    pub fn new(command: ServerCommand) -> Self {
        Self { command }
    }
}

#[async_trait]
impl SessionConnector for McpConnector {
    async fn connect(&self) -> Result<Box<dyn ToolSession>, SessionError> {
        Ok(Box::new(McpClient::spawn(&self.command).await?))
    }
}

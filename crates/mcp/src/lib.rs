//! MCP (Model Context Protocol) plumbing between the orchestrator and the
//! repoctx tool executor.
//!
//! - **types**: JSON-RPC 2.0 and MCP-specific protocol types
//! - **transport**: newline-delimited JSON over stdio, child pipes, or channels
//! - **server**: MCP server wrapping a `ToolRegistry`
//! - **client**: spawns the server as a subprocess and acts as a `ToolSession`
//! - **error**: unified error type
//!
//! # Usage
//!
//! ```no_run
//! use repoctx_mcp::{McpConnector, ServerCommand};
//! use repoctx_tool_runtime::{SessionConnector, ToolSession};
//!
//! # async fn example() -> Result<(), repoctx_tool_runtime::SessionError> {
//! let connector = McpConnector::new(ServerCommand::new("repoctx-mcp-server"));
//! let mut session = connector.connect().await?;
//! let tools = session.list_tools().await?;
//! assert!(!tools.is_empty());
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod server;
pub mod transport;
pub mod types;

pub use client::{McpClient, McpConnector, ServerCommand};
pub use error::McpError;
pub use server::McpServer;
pub use transport::{ChannelTransport, ChildTransport, LineTransport, McpTransport, StdioTransport};
pub use types::*;

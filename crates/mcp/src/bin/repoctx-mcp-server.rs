//! repoctx-mcp-server: tool executor serving MCP over stdio.
//!
//! Reads JSON-RPC requests from stdin and answers on stdout until stdin
//! closes. Logs go to stderr.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use repoctx_core::config::{load_dotenv, Config};
use repoctx_mcp::{McpServer, StdioTransport};
use repoctx_tool_runtime::{ToolContext, ToolRegistry};

/// Serve the repoctx tools (browse_folder, checkout_git_repo,
/// combine_path_dictionary, server_status) over MCP stdio.
#[derive(Parser, Debug)]
#[command(name = "repoctx-mcp-server", version, about)]
struct Cli {
    /// Base directory for relative tool paths (defaults to the current directory).
    #[arg(long)]
    working_dir: Option<PathBuf>,

    /// Parent directory for clones and combined artifacts.
    #[arg(long, env = "REPOCTX_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();
    let config = Config::from_env();

    let working_dir = match cli.working_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("cannot determine current directory")?,
    };
    let scratch_dir = cli.scratch_dir.unwrap_or(config.server.scratch_dir);

    info!(
        working_dir = %working_dir.display(),
        scratch_dir = %scratch_dir.display(),
        "repoctx-mcp-server starting"
    );

    let mut server = McpServer::new(
        ToolRegistry::with_builtin_tools(),
        ToolContext::new(working_dir, scratch_dir),
    );
    let mut transport = StdioTransport::stdio();
    server
        .run(&mut transport)
        .await
        .context("MCP server loop failed")?;

    info!("repoctx-mcp-server exited cleanly");
    Ok(())
}

mod cli;
mod server_command;
mod terminal;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use repoctx_core::config::{load_dotenv, Config};
use repoctx_llm::{ArtifactGenerator, ArtifactKind, GeminiProvider};
use repoctx_mcp::McpConnector;
use repoctx_tool_runtime::tools::{clone_repository, combine_files, scan_directory, ScanOutput};
use repoctx_tool_runtime::Orchestrator;

use crate::cli::{CliArgs, Command};
use crate::terminal::Terminal;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    load_dotenv();
    let args = CliArgs::parse();
    let profile = args.profile.clone().unwrap_or_default();
    let config = Config::from_lookup(&profile, |key| std::env::var(key).ok());
    config.log_summary();

    let terminal = Terminal::new();
    if let Err(e) = execute(args.command, &config, &terminal).await {
        terminal.print_error(&format!("{e:#}"))?;
        std::process::exit(1);
    }
    Ok(())
}

async fn execute(command: Command, config: &Config, terminal: &Terminal) -> Result<()> {
    match command {
        Command::Run {
            prompt,
            policy,
            max_iterations,
            pacing_ms,
            transcript,
        } => {
            let mut orchestrator = build_orchestrator(config)?;
            if let Some(policy) = policy {
                orchestrator = orchestrator.with_policy(policy);
            }
            if let Some(max) = max_iterations {
                orchestrator = orchestrator.with_max_iterations(max);
            }
            if let Some(ms) = pacing_ms {
                orchestrator = orchestrator.with_tool_pacing(Duration::from_millis(ms));
            }

            let output = orchestrator
                .run_with_history(&prompt)
                .await
                .context("run failed")?;
            info!(dispatches = output.dispatches, turns = output.conversation.len(), "run finished");

            if transcript {
                terminal.print_transcript(output.conversation.turns())?;
            }
            terminal.print_answer(&output.answer)
        }
        Command::Scan { path } => {
            let scan = scan(path).await?;
            terminal.print_scan(&scan.tree_string, &scan.path_dictionary)
        }
        Command::Combine { path } => {
            let scan = scan(path).await?;
            let combined =
                combine_files(&scan.tree_string, &scan.path_dictionary, &config.server.scratch_dir)
                    .await
                    .context("failed to combine files")?;
            terminal.print_info(&format!("{} files combined", combined.path_dictionary.len()))?;
            terminal.print_answer(&combined.output_file_path.display().to_string())
        }
        Command::Clone { url } => {
            let scratch = config.server.scratch_dir.clone();
            let target = url.clone();
            let local = tokio::task::spawn_blocking(move || clone_repository(&target, &scratch))
                .await
                .context("clone task panicked")?
                .with_context(|| format!("failed to clone {url}"))?;
            terminal.print_answer(&local.display().to_string())
        }
        Command::UnitTests {
            context,
            source,
            output,
        } => artifact(config, terminal, ArtifactKind::UnitTests, &context, &source, output).await,
        Command::Comment {
            context,
            source,
            output,
        } => artifact(config, terminal, ArtifactKind::Comments, &context, &source, output).await,
    }
}

fn build_orchestrator(config: &Config) -> Result<Orchestrator> {
    let provider = GeminiProvider::from_config(&config.gemini).context("cannot create model backend")?;
    let command = server_command::resolve(config, server_command::current_exe_dir().as_deref());
    info!(server = %command.program.display(), model = provider.model(), "orchestrator ready");

    Ok(Orchestrator::new(
        Arc::new(provider),
        Arc::new(McpConnector::new(command)),
        config.orchestrator.clone(),
    ))
}

async fn scan(path: PathBuf) -> Result<ScanOutput> {
    let shown = path.display().to_string();
    tokio::task::spawn_blocking(move || scan_directory(&path))
        .await
        .context("scan task panicked")?
        .with_context(|| format!("failed to scan {shown}"))
}

async fn artifact(
    config: &Config,
    terminal: &Terminal,
    kind: ArtifactKind,
    context: &Path,
    source: &Path,
    output: Option<PathBuf>,
) -> Result<()> {
    let provider = GeminiProvider::from_config(&config.gemini).context("cannot create model backend")?;
    let generator = ArtifactGenerator::new(provider);
    let code = generator
        .generate(kind, context, source)
        .await
        .with_context(|| format!("failed to generate {kind:?} for {}", source.display()))?;

    match output {
        Some(path) => {
            tokio::fs::write(&path, &code)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            terminal.print_info(&format!("wrote {}", path.display()))
        }
        None => terminal.print_answer(&code),
    }
}

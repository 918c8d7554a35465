use std::path::PathBuf;

use clap::{Parser, Subcommand};
use repoctx_core::ToolCallPolicy;

/// Build repository context with a tool-calling model.
///
/// Settings not given on the command line come from the environment
/// (and `.env`): GEMINI_API_KEY, GEMINI_MODEL, REPOCTX_*.
#[derive(Parser, Debug)]
#[command(name = "repoctx", version, about = "Build repository context with a tool-calling model")]
pub struct CliArgs {
    /// Config profile; keys are read as <PROFILE>_<KEY> first
    #[arg(long, env = "REPOCTX_PROFILE", global = true)]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Let the model drive the tools until it produces a final answer
    Run {
        /// Natural-language instruction
        prompt: String,

        /// Tool calls honoured per model response: first or all
        #[arg(long)]
        policy: Option<ToolCallPolicy>,

        /// Maximum model round-trips before giving up
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Delay in milliseconds before each tool dispatch after the first
        #[arg(long)]
        pacing_ms: Option<u64>,

        /// Print every turn of the conversation, not only the answer
        #[arg(long)]
        transcript: bool,
    },

    /// Print the directory tree and the numbered source files
    Scan {
        path: PathBuf,
    },

    /// Scan a directory and combine its source files into one artifact
    Combine {
        path: PathBuf,
    },

    /// Clone a repository into the scratch directory
    Clone {
        url: String,
    },

    /// Generate a pytest suite for a source file
    UnitTests {
        /// Context file, typically a combined artifact
        #[arg(long)]
        context: PathBuf,

        source: PathBuf,

        /// Write the result here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Add docstrings and comments to a source file
    Comment {
        /// Context file, typically a combined artifact
        #[arg(long)]
        context: PathBuf,

        source: PathBuf,

        /// Write the result here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

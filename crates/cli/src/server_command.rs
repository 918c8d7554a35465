use std::path::{Path, PathBuf};

use repoctx_core::Config;
use repoctx_mcp::ServerCommand;

/// The configured tool server command. A bare program name is replaced by
/// the binary of the same name next to `exe_dir` when one exists there, so
/// an installed or freshly built `repoctx` finds its server without `PATH`.
pub fn resolve(config: &Config, exe_dir: Option<&Path>) -> ServerCommand {
    let mut command = ServerCommand::from_config(config);
    if let Some(sibling) = exe_dir.and_then(|dir| sibling_binary(dir, &command.program)) {
        tracing::debug!(server = %sibling.display(), "using sibling tool server binary");
        command.program = sibling;
    }
    command
}

fn sibling_binary(dir: &Path, program: &Path) -> Option<PathBuf> {
    if program.components().count() != 1 {
        return None;
    }
    let mut candidate = dir.join(program);
    if cfg!(windows) && candidate.extension().is_none() {
        candidate.set_extension("exe");
    }
    candidate.is_file().then_some(candidate)
}

/// Directory holding the running executable.
pub fn current_exe_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

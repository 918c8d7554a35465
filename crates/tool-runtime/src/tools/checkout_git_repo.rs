//! Clones a remote repository into scratch space.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::args::{ToolArgs, CHECKOUT_GIT_REPO};
use crate::tool::{Tool, ToolContext, ToolDefinition, ToolError};

/// Clone `url` into a fresh directory under `scratch_dir`.
///
/// The clone target is a temporary directory that is only kept once the
/// clone succeeds; on any failure it is removed before the error returns.
/// Blocking: run it off the async executor.
pub fn clone_repository(url: &str, scratch_dir: &Path) -> Result<PathBuf, ToolError> {
    std::fs::create_dir_all(scratch_dir).map_err(|e| {
        ToolError::ExecutionFailed(format!(
            "failed to create scratch dir '{}': {}",
            scratch_dir.display(),
            e
        ))
    })?;
    let target = tempfile::Builder::new()
        .prefix("repoctx-clone-")
        .tempdir_in(scratch_dir)
        .map_err(|e| ToolError::ExecutionFailed(format!("failed to create clone dir: {e}")))?;

    info!(url, target = %target.path().display(), "cloning repository");
    match git2::Repository::clone(url, target.path()) {
        Ok(_) => {
            let path = target.keep();
            info!(path = %path.display(), "repository cloned");
            Ok(path)
        }
        Err(e) => {
            warn!(url, error = %e, "clone failed");
            Err(ToolError::ExecutionFailed(format!(
                "failed to clone '{}': {}",
                url,
                e.message()
            )))
        }
    }
}

/// Checkout a git repository into a temporary folder.
pub struct CheckoutGitRepoTool;

#[async_trait]
impl Tool for CheckoutGitRepoTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: CHECKOUT_GIT_REPO.to_string(),
            description: "Checkout the git repo at the provided url into a temporary folder. \
                Returns local_path, the folder holding the checked out repository."
                .to_string(),
            input_schema: serde_json::json!({
                "$schema": "http://json-schema.org/draft-07/schema#",
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "The url of the git repository to checkout"
                    }
                },
                "required": ["url"],
                "additionalProperties": false
            }),
        }
    }

    async fn execute(&self, args: ToolArgs, context: &ToolContext) -> Result<Value, ToolError> {
        let ToolArgs::CheckoutGitRepo(args) = args else {
            return Err(ToolError::mismatched(CHECKOUT_GIT_REPO, &args));
        };
        let scratch = context.scratch_dir.clone();
        let url = args.url;

        let path = tokio::task::spawn_blocking(move || clone_repository(&url, &scratch))
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("clone task failed: {e}")))??;

        Ok(serde_json::json!({ "local_path": path }))
    }
}

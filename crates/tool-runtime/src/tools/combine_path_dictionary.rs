//! Concatenates numbered source files into a single context artifact.
//!
//! An unreadable entry never aborts the combination: an inline error marker
//! is written in place of its content and processing moves on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};

use crate::args::{PathDictionary, ToolArgs, COMBINE_PATH_DICTIONARY};
use crate::tool::{Tool, ToolContext, ToolDefinition, ToolError};

/// Name of the artifact inside its scratch directory.
pub const COMBINED_FILE_NAME: &str = "combined_project_code.txt";

const TREE_HEADER: &str = "---Arborescence of the project---";

/// Result of combining files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombineOutput {
    /// Path of the combined artifact
    pub output_file_path: PathBuf,
    /// The mapping that was combined, echoed back
    pub path_dictionary: PathDictionary,
}

/// Combine into a fresh directory under `scratch_dir`.
pub async fn combine_files(
    tree_string: &str,
    path_dictionary: &PathDictionary,
    scratch_dir: &Path,
) -> Result<CombineOutput, ToolError> {
    tokio::fs::create_dir_all(scratch_dir)
        .await
        .map_err(|e| io_failure("create scratch dir", scratch_dir, e))?;
    let out_dir = tempfile::Builder::new()
        .prefix("repoctx-combined-")
        .tempdir_in(scratch_dir)
        .map_err(|e| io_failure("create output dir", scratch_dir, e))?;

    combine_into(out_dir, tree_string, path_dictionary).await
}

/// Write the artifact into `out_dir`, which is removed again unless the
/// write succeeds.
async fn combine_into(
    out_dir: TempDir,
    tree_string: &str,
    path_dictionary: &PathDictionary,
) -> Result<CombineOutput, ToolError> {
    let output_file_path = out_dir.path().join(COMBINED_FILE_NAME);
    write_combined(tree_string, path_dictionary, &output_file_path).await?;
    let _ = out_dir.keep();

    Ok(CombineOutput {
        output_file_path,
        path_dictionary: path_dictionary.clone(),
    })
}

/// Write the combined artifact to `output`, entries in ascending id order.
pub async fn write_combined(
    tree_string: &str,
    path_dictionary: &PathDictionary,
    output: &Path,
) -> Result<(), ToolError> {
    info!(output = %output.display(), files = path_dictionary.len(), "combining files");

    let file = tokio::fs::File::create(output)
        .await
        .map_err(|e| io_failure("create", output, e))?;
    let mut out = BufWriter::new(file);

    let mut preamble = String::with_capacity(tree_string.len() + TREE_HEADER.len() + 2);
    preamble.push_str(TREE_HEADER);
    preamble.push('\n');
    preamble.push_str(tree_string);
    preamble.push('\n');
    out.write_all(preamble.as_bytes())
        .await
        .map_err(|e| io_failure("write", output, e))?;

    for (id, path) in path_dictionary {
        let section = match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                debug!(id, path = %path.display(), "added file");
                format!("{}{}", entry_header(*id, path), content)
            }
            Err(e) => {
                warn!(id, path = %path.display(), error = %e, "unreadable entry");
                format!("{}{}", entry_header(*id, path), error_marker(path, &e))
            }
        };
        out.write_all(section.as_bytes())
            .await
            .map_err(|e| io_failure("write", output, e))?;
    }

    out.flush().await.map_err(|e| io_failure("flush", output, e))?;
    Ok(())
}

fn entry_header(id: u64, path: &Path) -> String {
    let rule = "=".repeat(40);
    format!(
        "\n{rule}\n--- FILE: [{id}] | PATH: {} ---\n{rule}\n\n",
        path.display()
    )
}

fn error_marker(path: &Path, err: &std::io::Error) -> String {
    if err.kind() == std::io::ErrorKind::NotFound {
        format!("*** ERROR: File not found at path: {} ***\n", path.display())
    } else {
        format!("*** ERROR: Could not read file. Reason: {} ***\n", err)
    }
}

fn io_failure(action: &str, path: &Path, err: std::io::Error) -> ToolError {
    ToolError::ExecutionFailed(format!("failed to {} '{}': {}", action, path.display(), err))
}

/// Concatenate every file of a path dictionary into one artifact.
pub struct CombinePathDictionaryTool;

#[async_trait]
impl Tool for CombinePathDictionaryTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: COMBINE_PATH_DICTIONARY.to_string(),
            description: "For each file in the path_dictionary, take the content and combine all \
                of it, preceded by the tree_string, into one big file. Returns output_file_path, \
                the path to the combined file, and the path_dictionary."
                .to_string(),
            input_schema: serde_json::json!({
                "$schema": "http://json-schema.org/draft-07/schema#",
                "type": "object",
                "properties": {
                    "tree_string": {
                        "type": "string",
                        "description": "The arborescence of the folders as a string"
                    },
                    "path_dictionary": {
                        "type": "object",
                        "description": "Mapping from unique integer file id (as a string key) to the file path",
                        "additionalProperties": { "type": "string" }
                    }
                },
                "required": ["tree_string", "path_dictionary"],
                "additionalProperties": false
            }),
        }
    }

    async fn execute(&self, args: ToolArgs, context: &ToolContext) -> Result<Value, ToolError> {
        let ToolArgs::CombinePathDictionary(args) = args else {
            return Err(ToolError::mismatched(COMBINE_PATH_DICTIONARY, &args));
        };
        let output =
            combine_files(&args.tree_string, &args.path_dictionary, &context.scratch_dir).await?;
        serde_json::to_value(output).map_err(|e| ToolError::ExecutionFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::CombinePathDictionaryArgs;

    #[tokio::test]
    async fn test_missing_entry_gets_marker_and_others_survive() {
        let src = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let a = src.path().join("a.py");
        let c = src.path().join("c.py");
        let missing = src.path().join("b.py");
        tokio::fs::write(&a, "print('a')\n").await.unwrap();
        tokio::fs::write(&c, "print('c')\n").await.unwrap();

        let dict = PathDictionary::from([(1, a.clone()), (2, missing.clone()), (3, c.clone())]);
        let out = combine_files("root/", &dict, scratch.path()).await.unwrap();

        assert!(out.output_file_path.starts_with(scratch.path()));
        assert_eq!(out.path_dictionary, dict);

        let text = tokio::fs::read_to_string(&out.output_file_path).await.unwrap();
        assert!(text.starts_with("---Arborescence of the project---\nroot/\n"));
        assert!(text.contains("print('a')"));
        assert!(text.contains("print('c')"));
        assert!(text.contains(&format!(
            "*** ERROR: File not found at path: {} ***",
            missing.display()
        )));

        // Entries appear in id order
        let pos = |needle: &str| text.find(needle).unwrap();
        assert!(pos("--- FILE: [1]") < pos("--- FILE: [2]"));
        assert!(pos("--- FILE: [2]") < pos("--- FILE: [3]"));
    }

    #[tokio::test]
    async fn test_undecodable_entry_gets_reason_marker() {
        let src = tempfile::tempdir().unwrap();
        let out_path = src.path().join("out.txt");
        let binary = src.path().join("blob.py");
        tokio::fs::write(&binary, [0xff, 0xfe, 0xfd]).await.unwrap();

        let dict = PathDictionary::from([(7, binary)]);
        write_combined("tree", &dict, &out_path).await.unwrap();

        let text = tokio::fs::read_to_string(&out_path).await.unwrap();
        assert!(text.contains("--- FILE: [7] |"));
        assert!(text.contains("*** ERROR: Could not read file. Reason:"));
    }

    #[tokio::test]
    async fn test_header_layout() {
        let src = tempfile::tempdir().unwrap();
        let file = src.path().join("x.py");
        tokio::fs::write(&file, "X = 1\n").await.unwrap();
        let out_path = src.path().join("out.txt");

        write_combined("t/", &PathDictionary::from([(1, file.clone())]), &out_path)
            .await
            .unwrap();

        let text = tokio::fs::read_to_string(&out_path).await.unwrap();
        let rule = "=".repeat(40);
        let expected = format!(
            "---Arborescence of the project---\nt/\n\n{rule}\n--- FILE: [1] | PATH: {} ---\n{rule}\n\nX = 1\n",
            file.display()
        );
        assert_eq!(text, expected);
    }

    #[tokio::test]
    async fn test_unwritable_output_fails() {
        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("no/such/dir/out.txt");
        let err = write_combined("t", &PathDictionary::new(), &out_path)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed(_)));
    }

    #[tokio::test]
    async fn test_failed_write_removes_output_dir() {
        let scratch = tempfile::tempdir().unwrap();
        let out_dir = tempfile::Builder::new()
            .prefix("repoctx-combined-")
            .tempdir_in(scratch.path())
            .unwrap();
        // A directory in the artifact's place makes the create fail.
        std::fs::create_dir(out_dir.path().join(COMBINED_FILE_NAME)).unwrap();
        let staged = out_dir.path().to_path_buf();

        let err = combine_into(out_dir, "root/", &PathDictionary::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::ExecutionFailed(_)));
        assert!(!staged.exists());
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_successful_combine_keeps_output_dir() {
        let scratch = tempfile::tempdir().unwrap();
        let out = combine_files("root/", &PathDictionary::new(), scratch.path())
            .await
            .unwrap();

        let dir = out.output_file_path.parent().unwrap();
        assert!(dir.is_dir());
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_tool_returns_output_path() {
        let scratch = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(scratch.path().to_path_buf(), scratch.path().to_path_buf());
        let out = CombinePathDictionaryTool
            .execute(
                ToolArgs::CombinePathDictionary(CombinePathDictionaryArgs {
                    tree_string: "root/".to_string(),
                    path_dictionary: PathDictionary::new(),
                }),
                &ctx,
            )
            .await
            .unwrap();

        let path = PathBuf::from(out["output_file_path"].as_str().unwrap());
        assert!(path.exists());
        assert!(path.ends_with(COMBINED_FILE_NAME));
    }
}

//! Directory scan: renders a tree and numbers every source file.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::args::{PathDictionary, ToolArgs, BROWSE_FOLDER};
use crate::tool::{Tool, ToolContext, ToolDefinition, ToolError};
use crate::tools::symbols::{python_symbols, PySymbol};

/// Files with this extension are numbered and have their symbols listed.
pub const SOURCE_EXTENSION: &str = "py";

const PARSE_FAILED: &str = "[Could not parse file]";
const PERMISSION_DENIED: &str = "[Permission Denied]";

/// Result of scanning a directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanOutput {
    /// Rendered directory tree
    pub tree_string: String,
    /// Source file id -> absolute path, ids assigned depth-first from 1
    pub path_dictionary: PathDictionary,
}

enum NodeKind {
    Dir,
    File,
    Source { id: u64, symbols: Option<Vec<PySymbol>> },
    Denied,
}

struct Node {
    name: String,
    path: PathBuf,
    kind: NodeKind,
    children: Vec<Node>,
}

impl Node {
    fn new(name: String, path: PathBuf, kind: NodeKind) -> Self {
        Self {
            name,
            path,
            kind,
            children: Vec::new(),
        }
    }
}

/// Scan `root` recursively. Fails if `root` is not a directory.
pub fn scan_directory(root: &Path) -> Result<ScanOutput, ToolError> {
    if !root.is_dir() {
        return Err(ToolError::InvalidInput(format!(
            "'{}' is not a directory",
            root.display()
        )));
    }
    let root = std::path::absolute(root)
        .map_err(|e| ToolError::ExecutionFailed(format!("cannot resolve '{}': {e}", root.display())))?;

    let root_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string());

    let mut stack = vec![Node::new(root_name.clone(), root.clone(), NodeKind::Dir)];
    let mut path_dictionary = PathDictionary::new();

    let walker = WalkDir::new(&root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let Some(path) = e.path() else {
                    warn!(error = %e, "walk error without a path");
                    continue;
                };
                warn!(path = %path.display(), error = %e, "unreadable entry");
                if let Some(depth) = attach_point(&stack, path) {
                    collapse(&mut stack, depth + 1);
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::new(
                            PERMISSION_DENIED.to_string(),
                            path.to_path_buf(),
                            NodeKind::Denied,
                        ));
                    }
                }
                continue;
            }
        };

        collapse(&mut stack, entry.depth());
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path().to_path_buf();

        if entry.file_type().is_dir() {
            stack.push(Node::new(name, path, NodeKind::Dir));
        } else {
            let kind = if is_source(&path) {
                let id = path_dictionary.len() as u64 + 1;
                path_dictionary.insert(id, path.clone());
                let symbols = std::fs::read_to_string(&path)
                    .ok()
                    .map(|source| python_symbols(&source));
                NodeKind::Source { id, symbols }
            } else {
                NodeKind::File
            };
            if let Some(parent) = stack.last_mut() {
                parent.children.push(Node::new(name, path, kind));
            }
        }
    }

    collapse(&mut stack, 1);

    let mut lines = vec![format!("{}/", root_name)];
    if let Some(root_node) = stack.first() {
        render(&root_node.children, "", &mut lines);
    }

    debug!(root = %root.display(), files = path_dictionary.len(), "directory scanned");

    Ok(ScanOutput {
        tree_string: lines.join("\n"),
        path_dictionary,
    })
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn is_source(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION)
}

/// Pop nodes into their parents until `len` nodes remain on the stack.
fn collapse(stack: &mut Vec<Node>, len: usize) {
    let len = len.max(1);
    while stack.len() > len {
        if let Some(node) = stack.pop() {
            if let Some(parent) = stack.last_mut() {
                parent.children.push(node);
            }
        }
    }
}

/// Stack index of the node that should receive a marker for `path`:
/// the directory itself if it is open, otherwise its parent.
fn attach_point(stack: &[Node], path: &Path) -> Option<usize> {
    stack
        .iter()
        .rposition(|n| n.path == path)
        .or_else(|| stack.iter().rposition(|n| Some(n.path.as_path()) == path.parent()))
}

fn render(children: &[Node], prefix: &str, lines: &mut Vec<String>) {
    for (i, node) in children.iter().enumerate() {
        let last = i + 1 == children.len();
        let connector = if last { "└── " } else { "├── " };
        let child_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });

        match &node.kind {
            NodeKind::Dir => {
                lines.push(format!("{prefix}{connector}{}/", node.name));
                render(&node.children, &child_prefix, lines);
            }
            NodeKind::File | NodeKind::Denied => {
                lines.push(format!("{prefix}{connector}{}", node.name));
            }
            NodeKind::Source { id, symbols } => {
                lines.push(format!("{prefix}{connector}[{id}] {}", node.name));
                match symbols {
                    Some(symbols) => render_symbols(symbols, &child_prefix, lines),
                    None => lines.push(format!("{child_prefix}└── {PARSE_FAILED}")),
                }
            }
        }
    }
}

fn render_symbols(symbols: &[PySymbol], prefix: &str, lines: &mut Vec<String>) {
    for (i, symbol) in symbols.iter().enumerate() {
        let last = i + 1 == symbols.len();
        let connector = if last { "└── " } else { "├── " };
        match symbol {
            PySymbol::Function(name) => lines.push(format!("{prefix}{connector}def {name}()")),
            PySymbol::Class { name, methods } => {
                lines.push(format!("{prefix}{connector}class {name}"));
                let method_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
                for (j, method) in methods.iter().enumerate() {
                    let method_connector = if j + 1 == methods.len() { "└── " } else { "├── " };
                    lines.push(format!("{method_prefix}{method_connector}def {method}()"));
                }
            }
        }
    }
}

/// Scan a folder and its sub folders, numbering every source file.
pub struct BrowseFolderTool;

#[async_trait]
impl Tool for BrowseFolderTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: BROWSE_FOLDER.to_string(),
            description: "Browse or scan the folder and the sub folders of the path provided, and \
                list the files inside. Returns tree_string, the arborescence of the folders, and \
                path_dictionary, a mapping from unique file ids to absolute paths of the Python \
                files found."
                .to_string(),
            input_schema: serde_json::json!({
                "$schema": "http://json-schema.org/draft-07/schema#",
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "The path to the folder to browse"
                    }
                },
                "required": ["path"],
                "additionalProperties": false
            }),
        }
    }

    async fn execute(&self, args: ToolArgs, context: &ToolContext) -> Result<Value, ToolError> {
        let ToolArgs::BrowseFolder(args) = args else {
            return Err(ToolError::mismatched(BROWSE_FOLDER, &args));
        };
        let root = context.resolve(&args.path);

        let output = tokio::task::spawn_blocking(move || scan_directory(&root))
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("scan task failed: {e}")))??;

        serde_json::to_value(output).map_err(|e| ToolError::ExecutionFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::BrowseFolderArgs;
    use std::fs;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("pkg/sub")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join(".git/config"), "[core]").unwrap();
        fs::write(root.join("README.md"), "# readme").unwrap();
        fs::write(
            root.join("main.py"),
            "def main():\n    pass\n\nclass App:\n    def run(self):\n        pass\n",
        )
        .unwrap();
        fs::write(root.join("pkg/a.py"), "def a():\n    pass\n").unwrap();
        fs::write(root.join("pkg/sub/b.py"), "X = 1\n").unwrap();
        fs::write(root.join("pkg/sub/bad.py"), [0xff, 0xfe, 0x00]).unwrap();
        dir
    }

    #[test]
    fn test_numbering_is_depth_first_sorted() {
        let dir = fixture();
        let out = scan_directory(dir.path()).unwrap();

        let names: Vec<String> = out
            .path_dictionary
            .values()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["main.py", "a.py", "b.py", "bad.py"]);
        assert_eq!(out.path_dictionary.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert!(out.path_dictionary.values().all(|p| p.is_absolute()));
    }

    #[test]
    fn test_tree_rendering() {
        let dir = fixture();
        let out = scan_directory(dir.path()).unwrap();
        let root_name = dir.path().file_name().unwrap().to_string_lossy().into_owned();

        let expected = [
            format!("{root_name}/"),
            "├── README.md".to_string(),
            "├── [1] main.py".to_string(),
            "│   ├── def main()".to_string(),
            "│   └── class App".to_string(),
            "│       └── def run()".to_string(),
            "└── pkg/".to_string(),
            "    ├── [2] a.py".to_string(),
            "    │   └── def a()".to_string(),
            "    └── sub/".to_string(),
            "        ├── [3] b.py".to_string(),
            "        └── [4] bad.py".to_string(),
            "            └── [Could not parse file]".to_string(),
        ]
        .join("\n");
        assert_eq!(out.tree_string, expected);
    }

    #[test]
    fn test_hidden_entries_skipped() {
        let dir = fixture();
        let out = scan_directory(dir.path()).unwrap();
        assert!(!out.tree_string.contains(".git"));
    }

    #[test]
    fn test_not_a_directory() {
        let dir = fixture();
        let err = scan_directory(&dir.path().join("README.md")).unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));

        let err = scan_directory(&dir.path().join("missing")).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = scan_directory(dir.path()).unwrap();
        assert!(out.path_dictionary.is_empty());
        assert_eq!(out.tree_string.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_tool_output_shape() {
        let dir = fixture();
        let ctx = ToolContext::new(dir.path().to_path_buf(), std::env::temp_dir());
        let out = BrowseFolderTool
            .execute(
                ToolArgs::BrowseFolder(BrowseFolderArgs {
                    path: ".".to_string(),
                }),
                &ctx,
            )
            .await
            .unwrap();

        assert!(out["tree_string"].as_str().unwrap().contains("[1] main.py"));
        let main = out["path_dictionary"]["1"].as_str().unwrap();
        assert!(main.ends_with("main.py"));
    }
}

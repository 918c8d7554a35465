//! Drives the real `repoctx-mcp-server` binary over stdio.

use std::path::Path;

use repoctx_mcp::{McpClient, ServerCommand};
use repoctx_tool_runtime::ToolSession;
use serde_json::{json, Value};

fn server_command(work: &Path, scratch: &Path) -> ServerCommand {
    ServerCommand::new(env!("CARGO_BIN_EXE_repoctx-mcp-server"))
        .current_dir(work)
        .env("REPOCTX_SCRATCH_DIR", scratch.to_string_lossy())
        .env("RUST_LOG", "warn")
}

fn payload(content: &str) -> Value {
    serde_json::from_str(content).unwrap()
}

#[tokio::test]
async fn test_handshake_and_catalog() {
    let work = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let mut client = McpClient::spawn(&server_command(work.path(), scratch.path()))
        .await
        .unwrap();

    let info = client.server_info().unwrap();
    assert_eq!(info.name, "repoctx");

    let mut names: Vec<String> = client
        .list_tools()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec!["browse_folder", "checkout_git_repo", "combine_path_dictionary", "server_status"]
    );

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_scan_then_combine() {
    let work = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    std::fs::create_dir(work.path().join("pkg")).unwrap();
    std::fs::write(work.path().join("app.py"), "def run():\n    pass\n").unwrap();
    std::fs::write(work.path().join("pkg/util.py"), "class Helper:\n    pass\n").unwrap();

    let mut client = McpClient::spawn(&server_command(work.path(), scratch.path()))
        .await
        .unwrap();

    let scanned = client
        .call_tool("browse_folder", json!({"path": "."}))
        .await
        .unwrap();
    assert!(!scanned.is_error, "{}", scanned.content);
    let scan = payload(&scanned.content);
    assert!(scan["tree_string"].as_str().unwrap().contains("[2] util.py"));

    let combined = client
        .call_tool(
            "combine_path_dictionary",
            json!({
                "tree_string": scan["tree_string"],
                "path_dictionary": scan["path_dictionary"],
            }),
        )
        .await
        .unwrap();
    assert!(!combined.is_error, "{}", combined.content);

    let out = payload(&combined.content);
    let artifact = Path::new(out["output_file_path"].as_str().unwrap());
    assert!(artifact.starts_with(scratch.path()));
    let text = std::fs::read_to_string(artifact).unwrap();
    assert!(text.starts_with("---Arborescence of the project---"));
    assert!(text.contains("def run():"));
    assert!(text.contains("class Helper:"));

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_malformed_checkout_url() {
    let work = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let mut client = McpClient::spawn(&server_command(work.path(), scratch.path()))
        .await
        .unwrap();

    let out = client
        .call_tool("checkout_git_repo", json!({"url": "::not a repository url::"}))
        .await
        .unwrap();

    assert!(out.is_error);
    assert!(!out.content.trim().is_empty());
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_invalid_arguments_are_failure_payloads() {
    let work = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let mut client = McpClient::spawn(&server_command(work.path(), scratch.path()))
        .await
        .unwrap();

    let out = client
        .call_tool("combine_path_dictionary", json!({"tree_string": 3}))
        .await
        .unwrap();
    assert!(out.is_error);
    assert!(out.content.contains("Invalid input"));

    // The session is still usable afterwards.
    let status = client.call_tool("server_status", json!({})).await.unwrap();
    assert_eq!(payload(&status.content)["status"], "online");

    client.close().await.unwrap();
}

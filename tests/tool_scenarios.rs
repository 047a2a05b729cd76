//! End-to-end tool scenarios (S1-S4) against a temp working root, each
//! driven through `ToolRegistry` rather than calling a tool struct
//! directly, so the approval-mode gate and shell whitelist bookkeeping are
//! exercised along with the tool itself.

use std::sync::Arc;

use mogzi_agent::config::ToolApprovalMode;
use mogzi_agent::security::PathGuard;
use mogzi_agent::tools::{ToolContext, ToolRegistry};

fn ctx(root: &std::path::Path) -> ToolContext {
    ToolContext::new(Arc::new(PathGuard::new(root).unwrap()))
}

/// S1 - Edit with exact match.
#[tokio::test]
async fn s1_edit_with_exact_match() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("a.txt");
    tokio::fs::write(&file, "hello world\nhello\n").await.unwrap();

    let mut registry = ToolRegistry::new();
    let response = registry
        .invoke(
            "replace",
            serde_json::json!({
                "path": file.to_str().unwrap(),
                "old_string": "hello world",
                "new_string": "HELLO",
                "expected_replacements": 1,
            }),
            &ctx(dir.path()),
            ToolApprovalMode::All,
        )
        .await;

    assert!(response.is_success());
    let on_disk = tokio::fs::read_to_string(&file).await.unwrap();
    assert_eq!(on_disk, "HELLO\nhello\n");

    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(on_disk.as_bytes());
    assert_eq!(response.sha256.unwrap(), hex::encode(hasher.finalize()));
}

/// S2 - Edit with mismatched count.
#[tokio::test]
async fn s2_edit_with_mismatched_count() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("a.txt");
    tokio::fs::write(&file, "hello world\nhello\n").await.unwrap();

    let mut registry = ToolRegistry::new();
    let response = registry
        .invoke(
            "replace",
            serde_json::json!({
                "path": file.to_str().unwrap(),
                "old_string": "hello",
                "new_string": "HI",
                "expected_replacements": 1,
            }),
            &ctx(dir.path()),
            ToolApprovalMode::All,
        )
        .await;

    assert!(!response.is_success());
    assert!(response.error.unwrap().contains("expected 1 occurrence(s) but found 2"));
    assert_eq!(tokio::fs::read_to_string(&file).await.unwrap(), "hello world\nhello\n");
}

/// S3 - Out-of-root write.
#[tokio::test]
async fn s3_out_of_root_write() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = ToolRegistry::new();
    let response = registry
        .invoke(
            "write_file",
            serde_json::json!({"path": "/etc/passwd", "content": "x"}),
            &ctx(dir.path()),
            ToolApprovalMode::All,
        )
        .await;

    assert!(!response.is_success());
}

/// S3b - the readonly approval gate blocks a write tool before it ever
/// touches `PathGuard`, independent of where the path resolves.
#[tokio::test]
async fn readonly_mode_blocks_write_tool() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = ToolRegistry::new();
    let response = registry
        .invoke(
            "write_file",
            serde_json::json!({"path": "a.txt", "content": "x"}),
            &ctx(dir.path()),
            ToolApprovalMode::Readonly,
        )
        .await;

    assert!(!response.is_success());
    assert!(!dir.path().join("a.txt").exists());
}

/// S4 - Recursive listing prunes blacklisted directory contents.
#[tokio::test]
async fn s4_recursive_listing() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(dir.path().join("a.txt"), "x").await.unwrap();
    tokio::fs::create_dir_all(dir.path().join("node_modules")).await.unwrap();
    tokio::fs::write(dir.path().join("node_modules/x"), "x").await.unwrap();
    tokio::fs::create_dir_all(dir.path().join("src")).await.unwrap();
    tokio::fs::write(dir.path().join("src/b.txt"), "x").await.unwrap();

    let mut registry = ToolRegistry::new();
    let response = registry
        .invoke(
            "list_files",
            serde_json::json!({"path": ".", "recursive": true}),
            &ctx(dir.path()),
            ToolApprovalMode::Readonly,
        )
        .await;

    assert!(response.is_success());
    let content = response.content.unwrap();
    assert!(content.contains("a.txt"));
    assert!(content.contains("node_modules/"));
    assert!(content.contains("src/b.txt"));
    assert!(!content.contains("node_modules/x"));
}

//! Tool registry: lookup, approval-mode gating, and shell whitelist.
//!
//! The registry owns the process-wide shell command whitelist (see
//! `shell::root_token`). It is mutated only from the orchestrator task, so
//! the registry itself is not required to be `Sync` across concurrent
//! mutators — only the single active turn touches it at a time.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{info, warn};

use super::complete::AttemptCompletionTool;
use super::filesystem::{ListFilesTool, ReadFileTool, ReadImageFileTool, ReplaceInFileTool, ReplaceTool, WriteFileTool};
use super::shell::{root_token, ShellTool};
use super::types::{Tool, ToolCategory, ToolContext, ToolResponse};
use crate::config::ToolApprovalMode;

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Shell command root tokens approved so far this process, in "all" mode.
    shell_whitelist: HashSet<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            tools: HashMap::new(),
            shell_whitelist: HashSet::new(),
        };
        registry.register(ReadFileTool);
        registry.register(ListFilesTool);
        registry.register(WriteFileTool);
        registry.register(ReplaceTool);
        registry.register(ReplaceInFileTool);
        registry.register(ReadImageFileTool);
        registry.register(ShellTool);
        registry.register(AttemptCompletionTool);
        registry
    }

    fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn describe(&self) -> Vec<(String, String, Value)> {
        self.tools
            .values()
            .map(|t| (t.name().to_string(), t.description().to_string(), t.parameters()))
            .collect()
    }

    /// Invoke a tool by name, enforcing the approval mode. Always returns a
    /// `ToolResponse` (never an `Err`): every failure, including an unknown
    /// tool name or a readonly-mode block, is captured as a `FAILED`
    /// envelope so the model sees it the same way it sees any other tool
    /// failure.
    pub async fn invoke(
        &mut self,
        name: &str,
        args: Value,
        ctx: &ToolContext,
        approval_mode: ToolApprovalMode,
    ) -> ToolResponse {
        let start = Instant::now();

        let Some(tool) = self.tools.get(name).cloned() else {
            warn!(tool = name, "unknown tool requested");
            return ToolResponse::failed(name, format!("unknown tool: {name}"));
        };

        if tool.category() == ToolCategory::Write && approval_mode == ToolApprovalMode::Readonly {
            info!(tool = name, "blocked by readonly approval mode");
            return ToolResponse::failed(name, "Tool approvals are set to readonly");
        }

        if name == "shell" {
            if let Some(command) = args.get("command").and_then(|v| v.as_str()) {
                if let Some(token) = root_token(command) {
                    if self.shell_whitelist.insert(token.clone()) {
                        info!(tool = name, root_token = %token, "whitelisted shell command root");
                    }
                }
            }
        }

        let result = tool.execute(args, ctx).await;
        let elapsed = start.elapsed();

        match result {
            Ok(response) => {
                info!(tool = name, success = response.is_success(), duration_ms = elapsed.as_millis(), "tool executed");
                response
            }
            Err(e) => {
                warn!(tool = name, error = %e, duration_ms = elapsed.as_millis(), "tool execution errored");
                ToolResponse::failed(name, e.to_string())
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::PathGuard;
    use serde_json::json;
    use tempfile::tempdir;

    fn ctx(root: &std::path::Path) -> ToolContext {
        ToolContext::new(Arc::new(PathGuard::new(root).unwrap()))
    }

    #[tokio::test]
    async fn readonly_mode_blocks_write_file() {
        let dir = tempdir().unwrap();
        let mut registry = ToolRegistry::new();
        let response = registry
            .invoke(
                "write_file",
                json!({"path": "a.txt", "content": "x"}),
                &ctx(dir.path()),
                ToolApprovalMode::Readonly,
            )
            .await;
        assert!(!response.is_success());
        assert_eq!(response.error.unwrap(), "Tool approvals are set to readonly");
    }

    #[tokio::test]
    async fn readonly_mode_allows_read_file() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), "hi").await.unwrap();
        let mut registry = ToolRegistry::new();
        let response = registry
            .invoke(
                "read_file",
                json!({"path": "a.txt"}),
                &ctx(dir.path()),
                ToolApprovalMode::Readonly,
            )
            .await;
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn unknown_tool_returns_failed_envelope_not_error() {
        let dir = tempdir().unwrap();
        let mut registry = ToolRegistry::new();
        let response = registry
            .invoke("does_not_exist", json!({}), &ctx(dir.path()), ToolApprovalMode::All)
            .await;
        assert!(!response.is_success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn shell_root_token_is_whitelisted_on_first_use() {
        let dir = tempdir().unwrap();
        let mut registry = ToolRegistry::new();
        assert!(!registry.shell_whitelist.contains("echo"));
        let _ = registry
            .invoke("shell", json!({"command": "echo hi"}), &ctx(dir.path()), ToolApprovalMode::All)
            .await;
        assert!(registry.shell_whitelist.contains("echo"));
    }
}

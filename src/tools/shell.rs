//! Shell tool: runs a command via the platform shell with no TTY.
//!
//! Output is captured concurrently on stdout/stderr, ANSI sequences are
//! stripped before the result reaches the model, and the tool cooperates
//! with the turn's `CancellationToken` by racing the child process against
//! a polling cancellation check.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use super::types::{Tool, ToolCategory, ToolContext, ToolResponse};
use crate::error::Result;

#[cfg(target_os = "windows")]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd.exe");
    cmd.arg("/c").arg(command);
    cmd
}

#[cfg(target_os = "macos")]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("/bin/zsh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(all(unix, not(target_os = "macos")))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("/bin/bash");
    cmd.arg("-c").arg(command);
    cmd
}

/// Extract the whitelist-relevant root token of a shell command: strip
/// brace/paren metacharacters, split on whitespace/`;`/`&`/`|`, take the
/// first token, then take its last path segment.
pub fn root_token(command: &str) -> Option<String> {
    let stripped: String = command.chars().filter(|c| !"(){}".contains(*c)).collect();
    let first = stripped
        .split(|c: char| c == ' ' || c == ';' || c == '&' || c == '|')
        .find(|s| !s.is_empty())?;
    let segment = first.split(['/', '\\']).last().unwrap_or(first);
    if segment.is_empty() {
        None
    } else {
        Some(segment.to_string())
    }
}

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct ShellTool;

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Run a shell command in the working root with no TTY; captures stdout, stderr, and exit code"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Write
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {"type": "string"},
                "cwd": {"type": "string", "description": "Working directory relative to the working root"}
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResponse> {
        let Some(command) = args.get("command").and_then(|v| v.as_str()) else {
            return Ok(ToolResponse::failed("shell", "missing 'command' argument"));
        };

        let working_dir = if let Some(cwd) = args.get("cwd").and_then(|v| v.as_str()) {
            match ctx.path_guard.resolve(cwd) {
                Ok(p) => Some(p),
                Err(e) => return Ok(ToolResponse::failed("shell", e.to_string())),
            }
        } else {
            ctx.working_dir.clone().or_else(|| Some(ctx.path_guard.root().to_path_buf()))
        };

        let mut cmd = shell_command(command);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &working_dir {
            cmd.current_dir(dir);
        }

        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => return Ok(ToolResponse::failed("shell", format!("failed to spawn: {e}"))),
        };

        let pid = child.id();
        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();

        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stdout_pipe.take() {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stderr_pipe.take() {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });

        let cancellation = ctx.cancellation.clone();
        let status = loop {
            tokio::select! {
                result = child.wait() => {
                    match result {
                        Ok(status) => break Ok(status),
                        Err(e) => break Err(e),
                    }
                }
                _ = tokio::time::sleep(CANCEL_POLL_INTERVAL) => {
                    if cancellation.is_cancelled() {
                        let _ = child.start_kill();
                        return Ok(ToolResponse::failed("shell", "cancelled"));
                    }
                }
            }
        };

        let status = match status {
            Ok(s) => s,
            Err(e) => return Ok(ToolResponse::failed("shell", format!("wait failed: {e}"))),
        };

        let stdout_bytes = stdout_task.await.unwrap_or_default();
        let stderr_bytes = stderr_task.await.unwrap_or_default();

        let stdout = strip_ansi_escapes::strip_str(&String::from_utf8_lossy(&stdout_bytes));
        let stderr = strip_ansi_escapes::strip_str(&String::from_utf8_lossy(&stderr_bytes));
        let combined = if stderr.is_empty() {
            stdout.clone()
        } else {
            format!("{stdout}\n{stderr}")
        };

        let code = status.code().unwrap_or(-1);
        let notes = format!(
            "pid={}\nexit_code={code}\nstdout:\n{stdout}\nstderr:\n{stderr}",
            pid.map(|p| p.to_string()).unwrap_or_else(|| "unknown".into())
        );

        // A non-zero exit is not a tool failure: the command ran to
        // completion and its result (including the exit code) is reported
        // as a successful envelope.
        Ok(ToolResponse::success("shell").with_notes(notes).with_content(combined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::PathGuard;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn ctx(root: &std::path::Path) -> ToolContext {
        ToolContext::new(Arc::new(PathGuard::new(root).unwrap()))
    }

    #[test]
    fn root_token_strips_braces_and_takes_first_segment() {
        assert_eq!(root_token("git status"), Some("git".into()));
        assert_eq!(root_token("/usr/bin/ls -la"), Some("ls".into()));
        assert_eq!(root_token("{echo} hi"), Some("echo".into()));
        assert_eq!(root_token("foo; rm -rf /"), Some("foo".into()));
        assert_eq!(root_token("a&&b"), Some("a".into()));
        assert_eq!(root_token("a|b"), Some("a".into()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_command_and_captures_stdout() {
        let dir = tempdir().unwrap();
        let tool = ShellTool;
        let response = tool
            .execute(json!({"command": "echo hello"}), &ctx(dir.path()))
            .await
            .unwrap();
        assert!(response.is_success());
        assert!(response.content.unwrap().contains("hello"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_still_a_successful_envelope() {
        let dir = tempdir().unwrap();
        let tool = ShellTool;
        let response = tool
            .execute(json!({"command": "exit 3"}), &ctx(dir.path()))
            .await
            .unwrap();
        assert!(response.is_success());
        assert!(response.notes.unwrap().contains("exit_code=3"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn respects_cwd_argument() {
        let dir = tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("sub")).await.unwrap();
        tokio::fs::write(dir.path().join("sub/marker.txt"), "x").await.unwrap();

        let tool = ShellTool;
        let response = tool
            .execute(json!({"command": "ls", "cwd": "sub"}), &ctx(dir.path()))
            .await
            .unwrap();
        assert!(response.is_success());
        assert!(response.content.unwrap().contains("marker.txt"));
    }
}

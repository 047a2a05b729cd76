//! Core tool types: the structured response envelope, the `Tool` trait,
//! and the execution context every tool receives.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::error::Result;
use crate::security::PathGuard;

/// The stable XML-like envelope every tool returns, consumed both by the
/// model (as the `FunctionResult` body) and by the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Default)]
pub struct ToolResponse {
    pub tool_name: String,
    pub status: Option<ToolStatus>,
    pub absolute_path: Option<String>,
    pub sha256: Option<String>,
    pub notes: Option<String>,
    pub content: Option<String>,
    pub error: Option<String>,
}

impl ToolResponse {
    pub fn success(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            status: Some(ToolStatus::Success),
            ..Default::default()
        }
    }

    pub fn failed(tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            status: Some(ToolStatus::Failed),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.absolute_path = Some(path.into());
        self
    }

    pub fn with_sha256(mut self, sha: impl Into<String>) -> Self {
        self.sha256 = Some(sha.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, Some(ToolStatus::Success))
    }

    /// Render the literal envelope form documented in the external
    /// interfaces section.
    pub fn to_envelope(&self) -> String {
        let status_str = match self.status {
            Some(ToolStatus::Success) => "SUCCESS",
            Some(ToolStatus::Failed) => "FAILED",
            None => "FAILED",
        };

        let mut body = String::new();
        body.push_str(&format!("<tool_response tool_name=\"{}\">\n", xml_escape(&self.tool_name)));

        if let Some(notes) = &self.notes {
            body.push_str(&format!("  <notes>{}</notes>\n", xml_escape(notes)));
        }

        let mut result_attrs = format!("status=\"{status_str}\"");
        if let Some(path) = &self.absolute_path {
            result_attrs.push_str(&format!(" absolute_path=\"{}\"", xml_escape(path)));
        }
        if let Some(sha) = &self.sha256 {
            result_attrs.push_str(&format!(" sha256_checksum=\"{sha}\""));
        }
        body.push_str(&format!("  <result {result_attrs}/>\n"));

        if let Some(content) = &self.content {
            body.push_str(&format!(
                "  <content_on_disk>{}</content_on_disk>\n",
                xml_escape(content)
            ));
        }

        if let Some(error) = &self.error {
            body.push_str(&format!("  <error>{}</error>\n", xml_escape(error)));
        }

        body.push_str("</tool_response>");
        body
    }
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// A lightweight cooperative cancellation flag. One per turn; `Ctrl-C`
/// signals it. Every suspension point in a tool should check it.
#[derive(Debug, Clone)]
pub struct CancellationToken(Arc<std::sync::atomic::AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(std::sync::atomic::AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Execution context passed to every tool invocation.
#[derive(Clone)]
pub struct ToolContext {
    pub path_guard: Arc<PathGuard>,
    /// Relative working directory for the shell tool, if set via the
    /// `cwd` argument; must already have been validated against the root.
    pub working_dir: Option<std::path::PathBuf>,
    pub cancellation: CancellationToken,
}

impl ToolContext {
    pub fn new(path_guard: Arc<PathGuard>) -> Self {
        Self {
            path_guard,
            working_dir: None,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

/// Whether a tool is allowed to run under `ToolApprovalMode::Readonly`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCategory {
    /// Never blocked by readonly mode.
    Read,
    /// Blocked by readonly mode: write, replace, replace_in_file, shell, complete.
    Write,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value;
    fn category(&self) -> ToolCategory {
        ToolCategory::Read
    }
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_matches_literal_shape() {
        let response = ToolResponse::success("replace")
            .with_notes("Successfully modified file: /a.txt (1 replacement)")
            .with_path("/abs/path")
            .with_sha256("deadbeef")
            .with_content("HELLO\n");
        let envelope = response.to_envelope();
        assert!(envelope.starts_with("<tool_response tool_name=\"replace\">"));
        assert!(envelope.contains("status=\"SUCCESS\""));
        assert!(envelope.contains("sha256_checksum=\"deadbeef\""));
        assert!(envelope.ends_with("</tool_response>"));
    }

    #[test]
    fn failed_envelope_carries_error_not_content() {
        let response = ToolResponse::failed("replace", "0 occurrences");
        let envelope = response.to_envelope();
        assert!(envelope.contains("status=\"FAILED\""));
        assert!(envelope.contains("<error>0 occurrences</error>"));
        assert!(!envelope.contains("content_on_disk"));
    }

    #[test]
    fn envelope_escapes_special_characters() {
        let response = ToolResponse::success("read_file").with_content("<tag> & \"quote\"");
        let envelope = response.to_envelope();
        assert!(envelope.contains("&lt;tag&gt; &amp; &quot;quote&quot;"));
    }

    #[test]
    fn cancellation_token_starts_unset() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }
}

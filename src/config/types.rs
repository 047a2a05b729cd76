//! Configuration type definitions.
//!
//! All types implement serde traits for JSON serialization and have
//! sensible defaults so a config file only needs to name what it overrides.

use serde::{Deserialize, Serialize};

/// Tool approval mode, gating which tools `ToolRegistry` will dispatch.
/// Mutated at runtime by `/tool-approvals`; everything else in `Config`
/// is read-only after startup.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolApprovalMode {
    /// Write-capable tools (write, edit, shell, complete) return `FAILED`.
    #[default]
    Readonly,
    /// Every tool runs; shell command root tokens are whitelisted on first use.
    All,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// File path logs are written to. The TUI owns the terminal, so pretty
    /// logs never go to stdout/stderr while the chat screen is active.
    pub file: Option<String>,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            file: Some("~/.mogzi/agent.log".to_string()),
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Base URL of the abstract chat endpoint (see `llm::HttpChatClient`).
    pub endpoint: String,
    pub model: String,
    /// Idle timeout (seconds) for the streaming response before it is
    /// surfaced as a `Transport` failure. Informational only — shell
    /// commands have no equivalent timeout; the user is the timeout.
    pub idle_timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.anthropic.com/v1/messages".to_string(),
            model: "claude-sonnet-4-5".to_string(),
            idle_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory all tool filesystem operations are confined to.
    pub working_root: String,
    pub tool_approval_mode: ToolApprovalMode,
    /// Cap applied to `/session list` and `SessionStore::list`.
    pub session_list_limit: usize,
    pub chat: ChatConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            working_root: default_working_root(),
            tool_approval_mode: ToolApprovalMode::default(),
            session_list_limit: 20,
            chat: ChatConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// The tool sandbox root defaults to the process's current directory, not
/// a fixed location, so running the agent from a project checkout confines
/// tools to that checkout unless overridden.
fn default_working_root() -> String {
    std::env::current_dir()
        .unwrap_or_else(|_| std::path::PathBuf::from("."))
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_readonly() {
        let cfg = Config::default();
        assert_eq!(cfg.tool_approval_mode, ToolApprovalMode::Readonly);
        assert_eq!(cfg.session_list_limit, 20);
    }

    #[test]
    fn tool_approval_mode_serializes_lowercase() {
        let json = serde_json::to_string(&ToolApprovalMode::All).unwrap();
        assert_eq!(json, "\"all\"");
    }

    #[test]
    fn partial_config_uses_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"tool_approval_mode":"all"}"#).unwrap();
        assert_eq!(cfg.tool_approval_mode, ToolApprovalMode::All);
        assert_eq!(cfg.session_list_limit, 20);
    }
}

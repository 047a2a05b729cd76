//! Configuration loading, saving, and global state management.
//!
//! Configuration loads from `<platform-config-dir>/mogzi-agent/config.json`
//! with environment variable overrides (`MOGZI_<SECTION>_<KEY>`), then lives
//! process-wide behind a single `OnceCell<RwLock<Config>>`. Every field is
//! read-only after startup except `tool_approval_mode`, mutated by
//! `/tool-approvals` via `Config::update`.

mod types;
pub use types::*;

use std::path::PathBuf;
use std::sync::RwLock;

use once_cell::sync::OnceCell;

use crate::error::{AgentError, Result};

static CONFIG: OnceCell<RwLock<Config>> = OnceCell::new();

impl Config {
    pub fn dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mogzi-agent")
    }

    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load from the default path, creating it with defaults if absent.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    pub fn load_from_path(path: &std::path::Path) -> Result<Self> {
        let mut cfg = if path.exists() {
            let text = std::fs::read_to_string(path)?;
            serde_json::from_str(&text)?
        } else {
            Config::default()
        };
        apply_env_overrides(&mut cfg);
        Ok(cfg)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::path())
    }

    pub fn save_to_path(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Initialize the global config from `load()`. Errors if already
    /// initialized — callers must call this exactly once at startup.
    pub fn init() -> Result<()> {
        let cfg = Self::load()?;
        Self::init_with(cfg)
    }

    pub fn init_with(cfg: Config) -> Result<()> {
        CONFIG
            .set(RwLock::new(cfg))
            .map_err(|_| AgentError::Conflict("config already initialized".into()))
    }

    /// Clone of the current global config. Calling this before `init` is a
    /// programming error, not a tool error: every binary entry point calls
    /// `Config::init` before anything else runs.
    pub fn get() -> Config {
        CONFIG
            .get()
            .expect("Config::init must be called before Config::get")
            .read()
            .unwrap()
            .clone()
    }

    /// Mutate the global config under a write lock. Errors if not yet
    /// initialized.
    pub fn update<F: FnOnce(&mut Config)>(f: F) -> Result<()> {
        let lock = CONFIG
            .get()
            .ok_or_else(|| AgentError::Conflict("config not initialized".into()))?;
        let mut guard = lock.write().unwrap();
        f(&mut guard);
        Ok(())
    }

    pub fn working_root_path(&self) -> PathBuf {
        expand_home(&self.working_root)
    }
}

fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("MOGZI_WORKING_ROOT") {
        cfg.working_root = v;
    }
    if let Ok(v) = std::env::var("MOGZI_SESSION_LIST_LIMIT") {
        if let Ok(n) = v.parse() {
            cfg.session_list_limit = n;
        }
    }
    if let Ok(v) = std::env::var("MOGZI_CHAT_ENDPOINT") {
        cfg.chat.endpoint = v;
    }
    if let Ok(v) = std::env::var("MOGZI_CHAT_MODEL") {
        cfg.chat.model = v;
    }
    if let Ok(v) = std::env::var("MOGZI_LOGGING_LEVEL") {
        cfg.logging.level = v;
    }
}

/// Chat API keys are read directly from the environment, never stored in
/// the config file or on disk anywhere.
pub fn chat_api_key() -> Option<String> {
    std::env::var("ANTHROPIC_API_KEY")
        .or_else(|_| std::env::var("MOGZI_API_KEY"))
        .ok()
}

/// Expand a leading `~` to the user's home directory. Leaves absolute and
/// relative paths without a leading `~` untouched.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    }
    if let Some(rest) = path.strip_prefix("~/") {
        return dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest);
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_from_missing_path_returns_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let cfg = Config::load_from_path(&path).unwrap();
        assert_eq!(cfg.session_list_limit, 20);
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut cfg = Config::default();
        cfg.session_list_limit = 42;
        cfg.save_to_path(&path).unwrap();
        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.session_list_limit, 42);
    }

    #[test]
    fn expand_home_handles_tilde() {
        let expanded = expand_home("~/chats");
        assert!(expanded.ends_with("chats"));
        assert_ne!(expanded, PathBuf::from("~/chats"));
    }

    #[test]
    fn expand_home_leaves_absolute_path() {
        let expanded = expand_home("/tmp/workspace");
        assert_eq!(expanded, PathBuf::from("/tmp/workspace"));
    }

    #[test]
    fn env_override_applies() {
        std::env::set_var("MOGZI_SESSION_LIST_LIMIT", "7");
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.session_list_limit, 7);
        std::env::remove_var("MOGZI_SESSION_LIST_LIMIT");
    }
}

//! Slash commands: a registry of direct-effect and picker-opening commands
//! that never round-trip through the model (invariant 8 in the error
//! handling design). The TUI's Autocomplete input state and the
//! `UserSelection` TUI state both drive through this module.

use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::session::{Session, SessionHeader, SessionStore};

/// What a command did, for the TUI to react to. Picker-opening commands
/// return the data the picker needs to render; the TUI is responsible for
/// presenting it and feeding the selection back through `apply_selection`.
#[derive(Debug, Clone)]
pub enum CommandOutcome {
    /// Printed directly into the scrollback (e.g. `/help`'s table).
    Message(String),
    /// Request the TUI shut down.
    Exit,
    /// Clear the scrollback and in-memory history view (not the session).
    ClearScreen,
    /// Open the readonly/all picker; selection mutates the live config.
    OpenToolApprovalPicker,
    /// Open a picker over recent sessions; selection loads that session.
    OpenSessionListPicker(Vec<SessionHeader>),
    /// Session history was truncated in place.
    SessionCleared,
    /// Session was renamed immediately (`NAME` was supplied).
    SessionRenamed(String),
    /// No NAME was supplied to `/session rename`: the editor should be
    /// pre-filled with `command` plus a trailing space and returned to
    /// Normal input state for the user to type the argument.
    InputContinuation(String),
}

/// Mutable state a command handler needs: the active session and the
/// store it is persisted through. Config is mutated through
/// `crate::config::Config::update` directly by handlers that need it.
pub struct CommandContext<'a> {
    pub session: &'a mut Session,
    pub store: Arc<SessionStore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub name: &'static str,
    pub help: &'static str,
}

/// One registered command. `/session` is a single entry whose `execute`
/// dispatches on the first argument word (`list`, `clear`, `rename`) —
/// this mirrors how the spec describes it as one command with three
/// behaviors, not three separate top-level commands.
#[async_trait::async_trait]
pub trait SlashCommand: Send + Sync {
    fn descriptor(&self) -> CommandDescriptor;

    /// True if, given these arguments, accepting the suggestion should
    /// populate the editor with `name ` and return to Normal input state
    /// rather than executing immediately.
    fn requires_input_continuation(&self, _args: &str) -> bool {
        false
    }

    async fn execute(&self, args: &str, ctx: &mut CommandContext<'_>) -> Result<CommandOutcome>;
}

pub struct CommandRegistry {
    commands: Vec<Arc<dyn SlashCommand>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: vec![
                Arc::new(HelpCommand) as Arc<dyn SlashCommand>,
                Arc::new(ExitCommand { quit: false }),
                Arc::new(ExitCommand { quit: true }),
                Arc::new(ClearCommand),
                Arc::new(ToolApprovalsCommand),
                Arc::new(SessionCommand),
            ],
        }
    }

    /// `/help`-table source: name plus help text for every registered
    /// command, in registration order.
    pub fn descriptors(&self) -> Vec<CommandDescriptor> {
        self.commands.iter().map(|c| c.descriptor()).collect()
    }

    /// Case-insensitive prefix match over command names, for the editor's
    /// Autocomplete state. `prefix` includes the leading `/`.
    pub fn suggestions(&self, prefix: &str) -> Vec<CommandDescriptor> {
        let lower = prefix.to_lowercase();
        self.commands
            .iter()
            .map(|c| c.descriptor())
            .filter(|d| d.name.to_lowercase().starts_with(&lower))
            .collect()
    }

    fn find(&self, name: &str) -> Option<&Arc<dyn SlashCommand>> {
        self.commands.iter().find(|c| c.descriptor().name.eq_ignore_ascii_case(name))
    }

    /// Split `/name rest-of-line` into (name, args). Returns `None` if
    /// `line` doesn't start a slash command at all.
    fn split(line: &str) -> Option<(&str, &str)> {
        let line = line.trim();
        if !line.starts_with('/') {
            return None;
        }
        match line.split_once(char::is_whitespace) {
            Some((name, rest)) => Some((name, rest.trim())),
            None => Some((line, "")),
        }
    }

    /// Returns `Some` if `line` names a registered slash command. `None`
    /// means the line is ordinary chat input and should go to the model.
    pub async fn dispatch(&self, line: &str, ctx: &mut CommandContext<'_>) -> Option<Result<CommandOutcome>> {
        let (name, args) = Self::split(line)?;
        match self.find(name) {
            Some(command) => {
                if command.requires_input_continuation(args) {
                    Some(Ok(CommandOutcome::InputContinuation(command.descriptor().name.to_string())))
                } else {
                    Some(command.execute(args, ctx).await)
                }
            }
            None => Some(Err(AgentError::NotFound(format!("unknown command: {name}")))),
        }
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

struct HelpCommand;

#[async_trait::async_trait]
impl SlashCommand for HelpCommand {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor { name: "/help", help: "list available commands" }
    }

    async fn execute(&self, _args: &str, _ctx: &mut CommandContext<'_>) -> Result<CommandOutcome> {
        let registry = CommandRegistry::new();
        let mut table = String::from("Commands:\n");
        for d in registry.descriptors() {
            table.push_str(&format!("  {:<18} {}\n", d.name, d.help));
        }
        Ok(CommandOutcome::Message(table))
    }
}

struct ExitCommand {
    quit: bool,
}

#[async_trait::async_trait]
impl SlashCommand for ExitCommand {
    fn descriptor(&self) -> CommandDescriptor {
        if self.quit {
            CommandDescriptor { name: "/quit", help: "exit the program" }
        } else {
            CommandDescriptor { name: "/exit", help: "exit the program" }
        }
    }

    async fn execute(&self, _args: &str, _ctx: &mut CommandContext<'_>) -> Result<CommandOutcome> {
        Ok(CommandOutcome::Exit)
    }
}

struct ClearCommand;

#[async_trait::async_trait]
impl SlashCommand for ClearCommand {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor { name: "/clear", help: "clear the screen and history view" }
    }

    async fn execute(&self, _args: &str, _ctx: &mut CommandContext<'_>) -> Result<CommandOutcome> {
        Ok(CommandOutcome::ClearScreen)
    }
}

struct ToolApprovalsCommand;

#[async_trait::async_trait]
impl SlashCommand for ToolApprovalsCommand {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor { name: "/tool-approvals", help: "switch between readonly and all tool approval modes" }
    }

    async fn execute(&self, _args: &str, _ctx: &mut CommandContext<'_>) -> Result<CommandOutcome> {
        Ok(CommandOutcome::OpenToolApprovalPicker)
    }
}

struct SessionCommand;

#[async_trait::async_trait]
impl SlashCommand for SessionCommand {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor { name: "/session", help: "list | clear | rename [NAME]" }
    }

    fn requires_input_continuation(&self, args: &str) -> bool {
        let mut words = args.split_whitespace();
        matches!(words.next(), Some("rename")) && words.next().is_none()
    }

    async fn execute(&self, args: &str, ctx: &mut CommandContext<'_>) -> Result<CommandOutcome> {
        let mut words = args.split_whitespace();
        match words.next() {
            Some("list") => {
                let limit = crate::config::Config::get().session_list_limit;
                let headers = ctx.store.list(limit).await?;
                Ok(CommandOutcome::OpenSessionListPicker(headers))
            }
            Some("clear") => {
                ctx.session.clear_history();
                ctx.store.save(ctx.session).await?;
                Ok(CommandOutcome::SessionCleared)
            }
            Some("rename") => {
                let name = words.collect::<Vec<_>>().join(" ");
                if name.is_empty() {
                    return Ok(CommandOutcome::InputContinuation("/session rename".to_string()));
                }
                ctx.session.rename(name.clone());
                ctx.store.save(ctx.session).await?;
                Ok(CommandOutcome::SessionRenamed(name))
            }
            Some(other) => Err(AgentError::BadArgument(format!("unknown /session subcommand: {other}"))),
            None => Err(AgentError::BadArgument("/session requires list, clear, or rename".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ctx<'a>(session: &'a mut Session, store: Arc<SessionStore>) -> CommandContext<'a> {
        CommandContext { session, store }
    }

    #[tokio::test]
    async fn help_lists_every_registered_command() {
        let registry = CommandRegistry::new();
        let dir = tempdir().unwrap();
        let store = Arc::new(SessionStore::new(dir.path()));
        let mut session = Session::new();
        let outcome = registry.dispatch("/help", &mut ctx(&mut session, store)).await.unwrap().unwrap();
        match outcome {
            CommandOutcome::Message(text) => {
                assert!(text.contains("/session"));
                assert!(text.contains("/tool-approvals"));
            }
            other => panic!("expected Message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_command_is_an_error_not_sent_to_model() {
        let registry = CommandRegistry::new();
        let dir = tempdir().unwrap();
        let store = Arc::new(SessionStore::new(dir.path()));
        let mut session = Session::new();
        let outcome = registry.dispatch("/bogus", &mut ctx(&mut session, store)).await;
        assert!(outcome.unwrap().is_err());
    }

    #[tokio::test]
    async fn plain_text_is_not_dispatched() {
        let registry = CommandRegistry::new();
        let dir = tempdir().unwrap();
        let store = Arc::new(SessionStore::new(dir.path()));
        let mut session = Session::new();
        let outcome = registry.dispatch("hello there", &mut ctx(&mut session, store)).await;
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn session_rename_without_name_requests_input_continuation() {
        let registry = CommandRegistry::new();
        let dir = tempdir().unwrap();
        let store = Arc::new(SessionStore::new(dir.path()));
        let mut session = Session::new();
        let outcome = registry.dispatch("/session rename", &mut ctx(&mut session, store)).await.unwrap().unwrap();
        assert!(matches!(outcome, CommandOutcome::InputContinuation(cmd) if cmd == "/session rename"));
    }

    #[tokio::test]
    async fn session_rename_with_name_renames_immediately() {
        let registry = CommandRegistry::new();
        let dir = tempdir().unwrap();
        let store = Arc::new(SessionStore::new(dir.path()));
        let mut session = Session::new();
        let outcome = registry
            .dispatch("/session rename My Project", &mut ctx(&mut session, store))
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(outcome, CommandOutcome::SessionRenamed(name) if name == "My Project"));
        assert_eq!(session.name, "My Project");
    }

    #[tokio::test]
    async fn session_clear_truncates_history_but_keeps_identity() {
        let registry = CommandRegistry::new();
        let dir = tempdir().unwrap();
        let store = Arc::new(SessionStore::new(dir.path()));
        let mut session = Session::new();
        session.append(crate::session::ChatMessage::user("hi"));
        let id = session.id;
        registry.dispatch("/session clear", &mut ctx(&mut session, store)).await.unwrap().unwrap();
        assert!(session.history.is_empty());
        assert_eq!(session.id, id);
    }

    #[test]
    fn suggestions_match_prefix_case_insensitively() {
        let registry = CommandRegistry::new();
        let matches = registry.suggestions("/TO");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name, "/tool-approvals");
    }

    #[test]
    fn suggestions_empty_for_unmatched_prefix() {
        let registry = CommandRegistry::new();
        assert!(registry.suggestions("/zz").is_empty());
    }
}

//! The input line editor: cursor-addressable text buffer, submission
//! history, and the Normal/Autocomplete/UserSelection sub-states that
//! drive slash-command suggestions independently of the TUI-level state
//! machine (a picker overlay is a sub-state of the editor, not a separate
//! modal — see the interactive-pickers design note).

use crossterm::event::{KeyCode, KeyEvent};

use crate::commands::{CommandDescriptor, CommandRegistry};
use crate::tui::state_machine::Renderable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorSubState {
    Normal,
    /// Input starts with `/`: `selected` indexes into the current
    /// suggestion list (recomputed from the buffer on every keystroke).
    Autocomplete { selected: usize },
    /// A picker is open (`/tool-approvals`, `/session list`); `selected`
    /// indexes into whatever list of choices the picker supplied.
    UserSelection { selected: usize, choices: usize },
}

pub struct InputEditor {
    buffer: String,
    cursor: usize,
    history: Vec<String>,
    history_cursor: Option<usize>,
    sub_state: EditorSubState,
}

impl InputEditor {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            cursor: 0,
            history: Vec::new(),
            history_cursor: None,
            sub_state: EditorSubState::Normal,
        }
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn sub_state(&self) -> &EditorSubState {
        &self.sub_state
    }

    /// Replace the buffer outright, moving the cursor to the end. Used by
    /// input-continuation (`/session rename ` pre-fill) and by picker
    /// selection injection.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.buffer = text.into();
        self.cursor = self.buffer.len();
        self.sub_state = EditorSubState::Normal;
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
        self.sub_state = EditorSubState::Normal;
        self.history_cursor = None;
    }

    /// Open the picker sub-state with `choices` selectable entries.
    pub fn open_picker(&mut self, choices: usize) {
        self.sub_state = EditorSubState::UserSelection { selected: 0, choices };
    }

    /// Current suggestion list for the Autocomplete sub-state, recomputed
    /// from the buffer against `registry` every call rather than cached.
    pub fn suggestions(&self, registry: &CommandRegistry) -> Vec<CommandDescriptor> {
        if self.buffer.starts_with('/') {
            registry.suggestions(&self.buffer)
        } else {
            Vec::new()
        }
    }

    fn recompute_sub_state(&mut self, registry: &CommandRegistry) {
        self.sub_state = if self.buffer.starts_with('/') && !self.suggestions(registry).is_empty() {
            EditorSubState::Autocomplete { selected: 0 }
        } else {
            EditorSubState::Normal
        };
    }

    /// Handle one key event. `registry` is consulted to drive the
    /// Autocomplete sub-state's suggestion list; the caller still owns
    /// dispatching a submitted/accepted line to `CommandRegistry::dispatch`
    /// or the orchestrator.
    pub fn on_key(&mut self, key: KeyEvent) {
        match &mut self.sub_state {
            EditorSubState::UserSelection { selected, choices } => match key.code {
                KeyCode::Up => *selected = selected.saturating_sub(1),
                KeyCode::Down => {
                    if *selected + 1 < *choices {
                        *selected += 1;
                    }
                }
                _ => {}
            },
            EditorSubState::Autocomplete { selected } => match key.code {
                KeyCode::Up => *selected = selected.saturating_sub(1),
                KeyCode::Down => *selected += 1,
                KeyCode::Esc => self.sub_state = EditorSubState::Normal,
                _ => self.edit_buffer(key),
            },
            EditorSubState::Normal => self.edit_buffer(key),
        }
    }

    fn edit_buffer(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char(c) => {
                self.buffer.insert(self.cursor, c);
                self.cursor += c.len_utf8();
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    let prev = self.buffer[..self.cursor].chars().next_back().map(|c| c.len_utf8()).unwrap_or(1);
                    self.cursor -= prev;
                    self.buffer.drain(self.cursor..self.cursor + prev);
                }
            }
            KeyCode::Left => {
                if self.cursor > 0 {
                    let prev = self.buffer[..self.cursor].chars().next_back().map(|c| c.len_utf8()).unwrap_or(1);
                    self.cursor -= prev;
                }
            }
            KeyCode::Right => {
                if self.cursor < self.buffer.len() {
                    let next = self.buffer[self.cursor..].chars().next().map(|c| c.len_utf8()).unwrap_or(1);
                    self.cursor += next;
                }
            }
            _ => {}
        }
    }

    /// Recompute the Autocomplete/Normal sub-state after an edit. Callers
    /// that route through `on_key` directly should call this afterward;
    /// kept separate so picker key handling above doesn't also trigger a
    /// recompute against the buffer it never touches.
    pub fn refresh_autocomplete(&mut self, registry: &CommandRegistry) {
        if matches!(self.sub_state, EditorSubState::UserSelection { .. }) {
            return;
        }
        self.recompute_sub_state(registry);
    }

    /// Accept the highlighted suggestion. Returns the command name so the
    /// caller can check `requires_input_continuation`; pre-fills the
    /// buffer with `name ` either way, per the input-continuation pattern.
    pub fn accept_suggestion(&mut self, registry: &CommandRegistry) -> Option<&'static str> {
        let EditorSubState::Autocomplete { selected } = self.sub_state else {
            return None;
        };
        let matches = self.suggestions(registry);
        let chosen = matches.get(selected).or_else(|| matches.first())?;
        self.set_text(format!("{} ", chosen.name));
        Some(chosen.name)
    }

    /// Push a submitted line onto history and reset the buffer.
    pub fn submit(&mut self) -> String {
        let line = std::mem::take(&mut self.buffer);
        self.cursor = 0;
        self.sub_state = EditorSubState::Normal;
        if !line.trim().is_empty() {
            self.history.push(line.clone());
        }
        self.history_cursor = None;
        line
    }

    pub fn history_prev(&mut self) {
        if self.history.is_empty() {
            return;
        }
        let idx = match self.history_cursor {
            Some(i) if i > 0 => i - 1,
            Some(i) => i,
            None => self.history.len() - 1,
        };
        self.history_cursor = Some(idx);
        self.set_text(self.history[idx].clone());
    }

    pub fn history_next(&mut self) {
        match self.history_cursor {
            Some(i) if i + 1 < self.history.len() => {
                self.history_cursor = Some(i + 1);
                self.set_text(self.history[i + 1].clone());
            }
            Some(_) => {
                self.history_cursor = None;
                self.clear();
            }
            None => {}
        }
    }

    pub fn render(&self) -> Renderable {
        Renderable::single(format!("> {}", self.buffer))
    }
}

impl Default for InputEditor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState, KeyModifiers};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent { code, modifiers: KeyModifiers::NONE, kind: KeyEventKind::Press, state: KeyEventState::NONE }
    }

    #[test]
    fn typing_appends_to_buffer() {
        let mut editor = InputEditor::new();
        editor.on_key(key(KeyCode::Char('h')));
        editor.on_key(key(KeyCode::Char('i')));
        assert_eq!(editor.text(), "hi");
    }

    #[test]
    fn slash_prefix_enters_autocomplete_after_refresh() {
        let registry = CommandRegistry::new();
        let mut editor = InputEditor::new();
        editor.on_key(key(KeyCode::Char('/')));
        editor.refresh_autocomplete(&registry);
        assert!(matches!(editor.sub_state(), EditorSubState::Autocomplete { .. }));
    }

    #[test]
    fn accepting_suggestion_prefills_with_trailing_space() {
        let registry = CommandRegistry::new();
        let mut editor = InputEditor::new();
        editor.set_text("/hel");
        editor.refresh_autocomplete(&registry);
        let accepted = editor.accept_suggestion(&registry);
        assert_eq!(accepted, Some("/help"));
        assert_eq!(editor.text(), "/help ");
    }

    #[test]
    fn backspace_removes_last_char() {
        let mut editor = InputEditor::new();
        editor.set_text("hi");
        editor.on_key(key(KeyCode::Backspace));
        assert_eq!(editor.text(), "h");
    }

    #[test]
    fn submit_clears_buffer_and_records_history() {
        let mut editor = InputEditor::new();
        editor.set_text("hello");
        let submitted = editor.submit();
        assert_eq!(submitted, "hello");
        assert_eq!(editor.text(), "");
        editor.history_prev();
        assert_eq!(editor.text(), "hello");
    }
}

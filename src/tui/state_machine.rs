//! The TUI-level state machine: `Input`, `Thinking`, `ToolExecution`,
//! `UserSelection`. Transitions are driven by key events (Enter, Esc) and
//! by `agent::TurnEvent`s arriving from the orchestrator's channel.

use crossterm::event::KeyEvent;

use crate::tui::editor::InputEditor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuiState {
    Input,
    Thinking,
    ToolExecution,
    UserSelection,
}

/// A frame's worth of lines for the scrollback's live region. Kept as a
/// plain line list rather than a ratatui widget so the state machine has
/// no rendering-backend dependency; `ScrollbackTerminal` turns this into
/// an actual widget.
#[derive(Debug, Clone, Default)]
pub struct Renderable {
    pub lines: Vec<String>,
}

impl Renderable {
    pub fn single(line: impl Into<String>) -> Self {
        Self { lines: vec![line.into()] }
    }
}

/// Everything a state's hooks need to read: the editor (for Normal and
/// Autocomplete rendering) and the footer line (token usage).
pub struct StateContext<'a> {
    pub editor: &'a InputEditor,
    pub footer: &'a str,
}

pub struct TuiStateMachine {
    pub state: TuiState,
}

impl TuiStateMachine {
    pub fn new() -> Self {
        Self { state: TuiState::Input }
    }

    pub fn on_enter(&mut self, state: TuiState) {
        self.state = state;
    }

    /// `Input -> Thinking` on Enter with non-empty text not handled by
    /// SlashCommands. Returns whether the transition happened.
    pub fn submit_turn(&mut self) -> bool {
        if self.state == TuiState::Input {
            self.on_enter(TuiState::Thinking);
            true
        } else {
            false
        }
    }

    /// `Thinking -> ToolExecution` when the orchestrator reports a tool
    /// invocation beginning.
    pub fn tool_started(&mut self) {
        if self.state == TuiState::Thinking {
            self.on_enter(TuiState::ToolExecution);
        }
    }

    /// `ToolExecution -> Thinking` when a tool returns and the stream
    /// continues.
    pub fn tool_finished(&mut self) {
        if self.state == TuiState::ToolExecution {
            self.on_enter(TuiState::Thinking);
        }
    }

    /// `Thinking -> Input` at end of turn or on cancellation.
    pub fn turn_ended(&mut self) {
        self.on_enter(TuiState::Input);
    }

    /// `Input -> UserSelection` when a slash command opens a picker.
    pub fn open_picker(&mut self) {
        if self.state == TuiState::Input {
            self.on_enter(TuiState::UserSelection);
        }
    }

    /// `UserSelection -> Input` on selection or Esc.
    pub fn close_picker(&mut self) {
        if self.state == TuiState::UserSelection {
            self.on_enter(TuiState::Input);
        }
    }

    /// Dispatch a key event to the handler for the current state. Only
    /// `Input` delegates to the editor; the other states consume Esc (for
    /// `UserSelection`) or ignore keys (the orchestrator owns the turn).
    pub fn on_key(&mut self, key: KeyEvent, editor: &mut InputEditor) {
        match self.state {
            TuiState::Input => editor.on_key(key),
            TuiState::UserSelection => {
                if key.code == crossterm::event::KeyCode::Esc {
                    self.close_picker();
                }
            }
            TuiState::Thinking | TuiState::ToolExecution => {}
        }
    }

    pub fn render_dynamic(&self, ctx: &StateContext) -> Renderable {
        match self.state {
            TuiState::Input => ctx.editor.render(),
            TuiState::Thinking => Renderable::single("thinking...".to_string()),
            TuiState::ToolExecution => Renderable::single("running tool...".to_string()),
            TuiState::UserSelection => Renderable::single("select, or Esc to cancel".to_string()),
        }
    }
}

impl Default for TuiStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_turn_cycle_through_tool_call() {
        let mut sm = TuiStateMachine::new();
        assert_eq!(sm.state, TuiState::Input);
        assert!(sm.submit_turn());
        assert_eq!(sm.state, TuiState::Thinking);
        sm.tool_started();
        assert_eq!(sm.state, TuiState::ToolExecution);
        sm.tool_finished();
        assert_eq!(sm.state, TuiState::Thinking);
        sm.turn_ended();
        assert_eq!(sm.state, TuiState::Input);
    }

    #[test]
    fn picker_opens_and_closes() {
        let mut sm = TuiStateMachine::new();
        sm.open_picker();
        assert_eq!(sm.state, TuiState::UserSelection);
        sm.close_picker();
        assert_eq!(sm.state, TuiState::Input);
    }

    #[test]
    fn submit_turn_is_a_no_op_outside_input() {
        let mut sm = TuiStateMachine::new();
        sm.open_picker();
        assert!(!sm.submit_turn());
        assert_eq!(sm.state, TuiState::UserSelection);
    }
}

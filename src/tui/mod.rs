//! Single-threaded cooperative TUI: a state machine driving a scrollback
//! terminal, an input editor with slash-command autocomplete, and
//! interactive pickers, coordinating with the `Orchestrator` through
//! `agent::TurnEvent`s over a channel.

pub mod editor;
pub mod scrollback;
pub mod state_machine;

pub use editor::{EditorSubState, InputEditor};
pub use scrollback::ScrollbackTerminal;
pub use state_machine::{TuiState, TuiStateMachine};

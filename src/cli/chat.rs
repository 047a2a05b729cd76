//! The interactive `chat` subcommand: wires the orchestrator, the session
//! store, and the cooperative TUI together into one event loop.
//!
//! Terminal input is read on a dedicated OS thread (the `read()` syscall
//! blocks) and forwarded over a channel; everything downstream of that is a
//! single task selecting between input events, orchestrator turn events, and
//! the live-region redraw tick, matching the single-threaded cooperative
//! design: one task, many awaited sources, no shared mutable state across
//! threads.

use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{Event, KeyCode, KeyModifiers};
use tokio::sync::mpsc;

use mogzi_agent::agent::{Orchestrator, TurnEvent};
use mogzi_agent::commands::{CommandContext, CommandOutcome, CommandRegistry};
use mogzi_agent::config::Config;
use mogzi_agent::error::Result;
use mogzi_agent::llm::{ChatClient, HttpChatClient};
use mogzi_agent::security::PathGuard;
use mogzi_agent::session::{SessionHeader, SessionStore};
use mogzi_agent::tools::{CancellationToken, ToolContext};
use mogzi_agent::tui::state_machine::{Renderable, StateContext};
use mogzi_agent::tui::{InputEditor, ScrollbackTerminal, TuiState, TuiStateMachine};
use mogzi_agent::utils::tokens::format_footer;

/// Which picker is behind the editor's `UserSelection` sub-state, so Enter
/// can apply the highlighted choice instead of merely closing the overlay.
enum ActivePicker {
    ToolApproval,
    SessionList(Vec<SessionHeader>),
}

enum LoopAction {
    Continue,
    Exit(Result<()>),
    OpenPicker(ActivePicker),
}

/// Forward blocking terminal input events onto an async channel. The thread
/// exits once the receiver is dropped (send fails) or the terminal closes.
fn spawn_input_forwarder() -> mpsc::UnboundedReceiver<Event> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || loop {
        match crossterm::event::read() {
            Ok(event) => {
                if tx.send(event).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
    rx
}

pub async fn run_chat(store: &Arc<SessionStore>, session_query: Option<&str>, auto_submit: bool) -> Result<()> {
    let config = Config::get();

    let session_id = match session_query {
        Some(query) => Some(store.resolve(query).await?),
        None => None,
    };
    let mut session = store.get_or_create(session_id).await?;

    let working_root = config.working_root_path();
    tokio::fs::create_dir_all(&working_root).await?;
    let path_guard = Arc::new(PathGuard::new(&working_root)?);
    let tool_ctx = ToolContext::new(path_guard);
    let chat_client: Arc<dyn ChatClient> = Arc::new(HttpChatClient::new(config.chat.endpoint.clone()));
    let mut orchestrator = Orchestrator::new(store.clone(), chat_client, tool_ctx);

    let command_registry = CommandRegistry::new();
    let mut editor = InputEditor::new();
    let mut state_machine = TuiStateMachine::new();
    let mut footer = format_footer(0, 0, 0, 200_000);

    let mut terminal = ScrollbackTerminal::initialize()?;
    let mut input_events = spawn_input_forwarder();
    let mut render_ticker = tokio::time::interval(Duration::from_millis(33));

    if auto_submit && !session.initial_prompt.is_empty() {
        editor.set_text(session.initial_prompt.clone());
    }

    let mut active_picker: Option<ActivePicker> = None;

    let outcome = 'session: loop {
        tokio::select! {
            _ = render_ticker.tick() => {
                let ctx = StateContext { editor: &editor, footer: &footer };
                let renderable = state_machine.render_dynamic(&ctx);
                terminal.write_static(renderable, true)?;
            }
            maybe_event = input_events.recv() => {
                let Some(event) = maybe_event else { break 'session Ok(()); };
                let Event::Key(key) = event else { continue; };

                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    break 'session Ok(());
                }

                if state_machine.state == TuiState::UserSelection {
                    if key.code == KeyCode::Enter {
                        if let Some(picker) = active_picker.take() {
                            apply_picker_selection(picker, &editor, &mut terminal)?;
                        }
                        editor.clear();
                        state_machine.close_picker();
                    } else {
                        state_machine.on_key(key, &mut editor);
                        if key.code == KeyCode::Esc {
                            active_picker = None;
                        }
                    }
                    continue;
                }

                if state_machine.state != TuiState::Input {
                    state_machine.on_key(key, &mut editor);
                    continue;
                }

                match key.code {
                    KeyCode::Tab => {
                        editor.accept_suggestion(&command_registry);
                    }
                    KeyCode::Up => editor.history_prev(),
                    KeyCode::Down => editor.history_next(),
                    KeyCode::Enter => {
                        let line = editor.submit();
                        if line.trim().is_empty() {
                            continue;
                        }

                        let mut ctx = CommandContext { session: &mut session, store: store.clone() };
                        match command_registry.dispatch(&line, &mut ctx).await {
                            Some(Ok(outcome)) => match apply_command_outcome(outcome, &mut editor, &mut state_machine, &mut terminal)? {
                                LoopAction::Continue => {}
                                LoopAction::Exit(result) => break 'session result,
                                LoopAction::OpenPicker(picker) => active_picker = Some(picker),
                            },
                            Some(Err(e)) => {
                                terminal.write_static(Renderable::single(format!("error: {e}")), false)?;
                            }
                            None => {
                                run_turn(&mut orchestrator, &mut session, &line, &mut state_machine, &mut editor, &mut footer, &mut terminal, &mut input_events, &mut render_ticker).await?;
                            }
                        }
                    }
                    _ => {
                        editor.on_key(key);
                        editor.refresh_autocomplete(&command_registry);
                    }
                }
            }
        }
    };

    terminal.shutdown();
    outcome
}

/// Apply the highlighted choice once a picker is confirmed with Enter.
/// `/tool-approvals` actually mutates global config; `/session list` only
/// displays the chosen header, since switching the active session out from
/// under a running orchestrator is out of scope for this loop.
fn apply_picker_selection(picker: ActivePicker, editor: &InputEditor, terminal: &mut ScrollbackTerminal) -> Result<()> {
    let selected = match editor.sub_state() {
        mogzi_agent::tui::EditorSubState::UserSelection { selected, .. } => *selected,
        _ => 0,
    };

    match picker {
        ActivePicker::ToolApproval => {
            let mode = if selected == 0 {
                mogzi_agent::config::ToolApprovalMode::Readonly
            } else {
                mogzi_agent::config::ToolApprovalMode::All
            };
            Config::update(|cfg| cfg.tool_approval_mode = mode)?;
            terminal.write_static(Renderable::single(format!("tool approvals: {mode:?}")), false)?;
        }
        ActivePicker::SessionList(headers) => {
            if let Some(header) = headers.get(selected) {
                terminal.write_static(
                    Renderable::single(format!("selected session {} ({})", header.name, header.id)),
                    false,
                )?;
            }
        }
    }
    Ok(())
}

/// Apply a direct-effect command outcome.
fn apply_command_outcome(
    outcome: CommandOutcome,
    editor: &mut InputEditor,
    state_machine: &mut TuiStateMachine,
    terminal: &mut ScrollbackTerminal,
) -> Result<LoopAction> {
    match outcome {
        CommandOutcome::Message(text) => {
            terminal.write_static(Renderable { lines: text.lines().map(str::to_string).collect() }, false)?;
            Ok(LoopAction::Continue)
        }
        CommandOutcome::Exit => Ok(LoopAction::Exit(Ok(()))),
        CommandOutcome::ClearScreen => {
            terminal.write_static(Renderable::single(String::new()), false)?;
            Ok(LoopAction::Continue)
        }
        CommandOutcome::OpenToolApprovalPicker => {
            editor.open_picker(2);
            state_machine.open_picker();
            Ok(LoopAction::OpenPicker(ActivePicker::ToolApproval))
        }
        CommandOutcome::OpenSessionListPicker(headers) => {
            editor.open_picker(headers.len().max(1));
            state_machine.open_picker();
            Ok(LoopAction::OpenPicker(ActivePicker::SessionList(headers)))
        }
        CommandOutcome::SessionCleared => {
            terminal.write_static(Renderable::single("session cleared".to_string()), false)?;
            Ok(LoopAction::Continue)
        }
        CommandOutcome::SessionRenamed(name) => {
            terminal.write_static(Renderable::single(format!("session renamed to {name}")), false)?;
            Ok(LoopAction::Continue)
        }
        CommandOutcome::InputContinuation(prefix) => {
            editor.set_text(format!("{prefix} "));
            Ok(LoopAction::Continue)
        }
    }
}

/// Drive one model turn to completion, selecting between `TurnEvent`s from
/// the orchestrator, Ctrl-C (cancellation), and the redraw tick. Mirrors the
/// outer loop's select shape but scoped to a single turn's lifetime.
#[allow(clippy::too_many_arguments)]
async fn run_turn(
    orchestrator: &mut Orchestrator,
    session: &mut mogzi_agent::session::Session,
    user_text: &str,
    state_machine: &mut TuiStateMachine,
    editor: &mut InputEditor,
    footer: &mut String,
    terminal: &mut ScrollbackTerminal,
    input_events: &mut mpsc::UnboundedReceiver<Event>,
    render_ticker: &mut tokio::time::Interval,
) -> Result<()> {
    state_machine.submit_turn();

    let cancellation = CancellationToken::new();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<TurnEvent>();
    let approval_mode = Config::get().tool_approval_mode;

    // Scoped so the future (and the mutable borrow of `session` it holds)
    // drops before `session` is read again below.
    let turn_result = {
        let turn_future = orchestrator.run_turn(session, user_text, approval_mode, cancellation.clone(), events_tx);
        tokio::pin!(turn_future);

        let mut finished = false;
        let mut result = Ok(());

        while !finished {
            tokio::select! {
                r = &mut turn_future => {
                    result = r;
                    finished = true;
                }
                Some(event) = events_rx.recv() => {
                    match event {
                        TurnEvent::TextDelta(_) => {}
                        TurnEvent::ToolStarted { .. } => state_machine.tool_started(),
                        TurnEvent::ToolFinished { .. } => state_machine.tool_finished(),
                        TurnEvent::TurnEnded | TurnEvent::Cancelled => {}
                    }
                }
                _ = render_ticker.tick() => {
                    let ctx = StateContext { editor: &*editor, footer: footer.as_str() };
                    let renderable = state_machine.render_dynamic(&ctx);
                    terminal.write_static(renderable, true)?;
                }
                maybe_event = input_events.recv() => {
                    if let Some(Event::Key(key)) = maybe_event {
                        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                            cancellation.cancel();
                        }
                    }
                }
            }
        }

        result
    };

    state_machine.turn_ended();
    let usage = &session.usage_metrics;
    *footer = format_footer(usage.input_tokens, usage.output_tokens, session_context_used(session), 200_000);

    turn_result
}

fn session_context_used(session: &mogzi_agent::session::Session) -> u64 {
    session.history.iter().map(|m| m.content.len() as u64).sum()
}

//! `ScrollbackTerminal`: a static append-only region (history) plus at
//! most one updatable region at the bottom (the live editor/thinking
//! line). Writing non-updatable content clears the live region first;
//! writing updatable content replaces any prior updatable content.

use std::io;
use std::time::Duration;

use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, Clear, ClearType};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::widgets::{Paragraph, Wrap};
use ratatui::Terminal;
use tracing::warn;

use crate::tui::state_machine::Renderable;

const DYNAMIC_REFRESH: Duration = Duration::from_millis(33); // ~30 Hz

pub struct ScrollbackTerminal {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    static_lines: Vec<String>,
    live_region: Option<Renderable>,
}

impl ScrollbackTerminal {
    /// Clear the screen and hide the cursor. Raw mode is entered here so
    /// every keystroke reaches the editor directly rather than the line
    /// discipline.
    pub fn initialize() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, Clear(ClearType::All))?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.hide_cursor()?;
        Ok(Self { terminal, static_lines: Vec::new(), live_region: Option::None })
    }

    /// Append non-updatable content to the static history, or replace the
    /// live region if `is_updatable` is set.
    pub fn write_static(&mut self, renderable: Renderable, is_updatable: bool) -> io::Result<()> {
        if is_updatable {
            self.live_region = Some(renderable);
        } else {
            self.live_region = None;
            self.static_lines.extend(renderable.lines);
        }
        self.refresh()
    }

    /// Begin periodic redraws of the live region at `DYNAMIC_REFRESH`
    /// cadence, calling `provider` on every tick or whenever `cancel`
    /// fires, until `cancel` signals cancellation.
    pub async fn start_dynamic<F>(&mut self, mut provider: F, cancellation: crate::tools::CancellationToken) -> io::Result<()>
    where
        F: FnMut() -> Renderable,
    {
        let mut ticker = tokio::time::interval(DYNAMIC_REFRESH);
        loop {
            if cancellation.is_cancelled() {
                return Ok(());
            }
            self.live_region = Some(provider());
            self.refresh()?;
            ticker.tick().await;
        }
    }

    pub fn refresh(&mut self) -> io::Result<()> {
        let static_lines = self.static_lines.clone();
        let live_region = self.live_region.clone();
        self.terminal
            .draw(|frame| {
                let area = frame.area();
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Min(0), Constraint::Length(1)])
                    .split(area);

                let history = Paragraph::new(static_lines.join("\n")).wrap(Wrap { trim: false });
                frame.render_widget(history, chunks[0]);

                if let Some(live) = &live_region {
                    let live_widget = Paragraph::new(live.lines.join("\n"));
                    frame.render_widget(live_widget, chunks[1]);
                }
            })
            .map(|_| ())
    }

    /// Show the cursor and leave raw mode. Best-effort: a failure here
    /// shouldn't mask whatever error triggered shutdown, so it is logged
    /// rather than propagated.
    pub fn shutdown(mut self) {
        if let Err(e) = self.terminal.show_cursor() {
            warn!(error = %e, "failed to restore cursor");
        }
        if let Err(e) = disable_raw_mode() {
            warn!(error = %e, "failed to leave raw mode");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // `ScrollbackTerminal::initialize` needs a real tty (raw mode), so it
    // is not exercised here; `Renderable` construction is covered instead.
    #[test]
    fn single_line_renderable_has_exactly_one_line() {
        let r = Renderable::single("thinking...");
        assert_eq!(r.lines, vec!["thinking...".to_string()]);
    }
}

//! Main TUI application.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing::{debug, warn};

use crate::storage::stream::RecordTailer;
use crate::worker::SamplerController;

use super::event::{Event, EventHandler};
use super::input::{KeyAction, handle_key};
use super::render::render;
use super::state::ViewState;

/// Live view over a record stream.
pub struct App {
    tailer: RecordTailer,
    state: ViewState,
    /// Set from outside (signal handler) to request shutdown.
    quit: Arc<AtomicBool>,
    should_quit: bool,
}

impl App {
    /// Creates an app tailing `log` from its beginning.
    pub fn new(log: impl Into<PathBuf>, quit: Arc<AtomicBool>) -> Self {
        Self {
            tailer: RecordTailer::new(log),
            state: ViewState::new(Instant::now()),
            quit,
            should_quit: false,
        }
    }

    /// Runs the TUI until a quit key or the quit flag.
    ///
    /// Redraws every `tick_rate`. The terminal is restored before returning,
    /// also when drawing failed. Stopping the worker is left to the caller.
    pub fn run(mut self, tick_rate: Duration, worker: &mut SamplerController) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(e);
        }
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal, tick_rate, worker);

        // Restore terminal
        let restored = disable_raw_mode()
            .and_then(|_| execute!(terminal.backend_mut(), LeaveAlternateScreen))
            .and_then(|_| terminal.show_cursor());

        result.and(restored)
    }

    fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        tick_rate: Duration,
        worker: &mut SamplerController,
    ) -> io::Result<()> {
        let events = EventHandler::new(tick_rate);

        // Initial data fetch
        self.refresh(worker);

        loop {
            terminal.draw(|frame| render(frame, &self.state))?;

            match events.next() {
                Ok(Event::Tick) => self.refresh(worker),
                Ok(Event::Key(key)) => {
                    if handle_key(key) == KeyAction::Quit {
                        self.should_quit = true;
                    }
                }
                Ok(Event::Resize) => {}
                Err(_) => self.should_quit = true,
            }

            if self.quit.load(Ordering::SeqCst) {
                debug!("quit requested by signal");
                self.should_quit = true;
            }
            if self.should_quit {
                break;
            }
        }
        Ok(())
    }

    /// Reads new records and checks on the worker.
    fn refresh(&mut self, worker: &mut SamplerController) {
        match self.tailer.poll() {
            Ok(batch) => self.state.apply_batch(batch),
            Err(e) => {
                warn!("failed to read {}: {}", self.tailer.path().display(), e);
                self.state.set_status(format!("read error: {}", e));
            }
        }

        match worker.poll() {
            Ok(Some(status)) => self.state.set_status(format!("sampler exited ({})", status)),
            Ok(None) => {}
            Err(e) => self.state.set_status(e.to_string()),
        }
    }
}

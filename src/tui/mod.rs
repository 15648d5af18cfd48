// TUI module - Terminal User Interface
//
// This module manages the chat screen using ratatui. It handles:
// - Terminal initialization and cleanup
// - Event loop (keyboard input, timer ticks, chat snapshots)
// - Rendering the UI
// - Forwarding queued chat commands to the chat service

pub mod app;
pub mod components;
pub mod composer;
pub mod keys;
pub mod layout;
pub mod scroll;
pub mod theme;
pub mod ui;

use crate::chat::ChatHandle;
use crate::config::Config;
use crate::logging::LogBuffer;
use anyhow::{Context, Result};
use app::App;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::time::Duration;
use theme::Theme;

/// Run the TUI
///
/// This function sets up the terminal, runs the event loop, and cleans up
/// when done. The terminal is restored even if the loop fails.
pub async fn run_tui(handle: ChatHandle, log_buffer: LogBuffer, config: Config) -> Result<()> {
    // Set up terminal
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to setup terminal")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    let mut app = App::new(
        handle.snapshot(),
        Theme::by_name(&config.theme),
        log_buffer,
        config.ui.clone(),
    );

    let result = run_event_loop(&mut terminal, &mut app, &handle, config.ui.tick_ms).await;

    // Restore terminal
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to restore terminal")?;
    terminal.show_cursor().context("Failed to show cursor")?;

    result
}

/// Main event loop
///
/// Waits on three sources with tokio::select!:
/// 1. Keyboard input
/// 2. Timer ticks (typing indicator, toast expiry)
/// 3. New chat snapshots from the service
async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    handle: &ChatHandle,
    tick_ms: u64,
) -> Result<()> {
    let mut tick_interval = tokio::time::interval(Duration::from_millis(tick_ms));
    let mut snapshots = handle.subscribe();

    loop {
        terminal
            .draw(|f| ui::draw(f, app))
            .context("Failed to draw terminal")?;

        tokio::select! {
            // Keyboard input
            _ = async {
                if event::poll(Duration::from_millis(10)).unwrap_or(false) {
                    if let Ok(Event::Key(key)) = event::read() {
                        if key.kind == KeyEventKind::Press {
                            if let Some(action) = keys::map_key(key) {
                                app.handle_action(action);
                            }
                        }
                    }
                }
            } => {}

            _ = tick_interval.tick() => {
                app.tick();
            }

            changed = snapshots.changed() => {
                if changed.is_err() {
                    tracing::error!("Chat service stopped");
                    app.should_quit = true;
                } else {
                    let snapshot = snapshots.borrow_and_update().clone();
                    app.apply_snapshot(snapshot);
                }
            }
        }

        for command in app.take_commands() {
            handle.dispatch(command);
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

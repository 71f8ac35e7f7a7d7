//! Terminal setup and the chat UI event loop.

use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{
    DisableBracketedPaste, EnableBracketedPaste, Event as CrosstermEvent, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
    supports_keyboard_enhancement,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tokio::sync::mpsc;

use crate::chat::Theme;
use crate::client::RelayClient;
use crate::clipboard::Osc52;
use crate::config::Config;
use crate::events::TuiEvent;
use crate::ui::conversation::{ConversationAction, ConversationManager};
use crate::voice::recognizer_from_config;

const TICK: Duration = Duration::from_millis(100);

/// Run the chat UI until the user quits.
pub async fn run(config: &Config) -> Result<()> {
    let theme = config.ui.theme.parse::<Theme>().unwrap_or_else(|err| {
        tracing::warn!("{}; using light theme", err);
        Theme::Light
    });
    let client = RelayClient::new(config.base_url()).with_session(config.client.session.clone());
    tracing::info!(base_url = client.base_url(), "starting chat UI");

    let mut manager = ConversationManager::new(
        client,
        theme,
        config.ui.contact_url.clone(),
        recognizer_from_config(&config.voice),
        Box::new(Osc52::stdout()),
    );

    let (enhanced, mut terminal) = setup_terminal()?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    spawn_input_handler(tx.clone());
    spawn_tick(tx);

    let result = async {
        loop {
            manager.process_events();
            terminal.draw(|frame| {
                let area = frame.size();
                manager.render(area, frame.buffer_mut(), Instant::now());
            })?;

            let event = rx.recv().await.context("input channel closed unexpectedly")?;
            match event {
                TuiEvent::Key(key) => {
                    if manager.handle_key(key) == ConversationAction::Exit {
                        break;
                    }
                }
                TuiEvent::Paste(text) => manager.handle_paste(&text),
                TuiEvent::Resize(..) | TuiEvent::Tick => {}
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    restore_terminal(&mut terminal, enhanced)?;
    tracing::info!("chat UI closed");
    result
}

/// Spawn a task to poll for terminal input.
fn spawn_input_handler(sender: mpsc::UnboundedSender<TuiEvent>) {
    tokio::task::spawn_blocking(move || {
        loop {
            if !matches!(crossterm::event::poll(Duration::from_millis(30)), Ok(true)) {
                if sender.is_closed() {
                    break;
                }
                continue;
            }
            let event = match crossterm::event::read() {
                Ok(CrosstermEvent::Key(key)) => TuiEvent::Key(key),
                Ok(CrosstermEvent::Paste(text)) => TuiEvent::Paste(text),
                Ok(CrosstermEvent::Resize(w, h)) => TuiEvent::Resize(w, h),
                Ok(_) => continue,
                Err(err) => {
                    tracing::error!("terminal read failed: {}", err);
                    break;
                }
            };
            if sender.send(event).is_err() {
                break;
            }
        }
    });
}

/// Spawn a periodic tick so timers and background results get drawn.
fn spawn_tick(sender: mpsc::UnboundedSender<TuiEvent>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK);
        loop {
            interval.tick().await;
            if sender.send(TuiEvent::Tick).is_err() {
                break;
            }
        }
    });
}

/// Configure terminal in raw mode with alternate screen.
fn setup_terminal() -> Result<(bool, Terminal<CrosstermBackend<Stdout>>)> {
    tracing::debug!("setting up terminal");
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;

    // Lets Shift+Enter arrive as its own key where the terminal supports it
    let enhanced = matches!(supports_keyboard_enhancement(), Ok(true));
    if enhanced {
        execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES)
        )?;
    }

    let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    Ok((enhanced, terminal))
}

/// Restore terminal state on exit.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>, enhanced: bool) -> Result<()> {
    tracing::debug!("restoring terminal");
    if enhanced {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)?;
    }
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableBracketedPaste, LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

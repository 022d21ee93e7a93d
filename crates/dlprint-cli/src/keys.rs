//! Manual stepping from the keyboard.
//!
//! `n` or space acknowledges the frame on screen so the stage moves on,
//! `q`, Esc or Ctrl-C stops the job.

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use dlprint_control::{FrameStore, PrintState, StopHandle};
use std::io;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

/// What a key press asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    Next,
    Stop,
}

fn action_for(key: &KeyEvent) -> Option<KeyAction> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('n') | KeyCode::Char(' ') => Some(KeyAction::Next),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(KeyAction::Stop)
        }
        KeyCode::Char('q') | KeyCode::Esc => Some(KeyAction::Stop),
        _ => None,
    }
}

/// Leaves raw mode when dropped.
struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Read keys until the job reaches a terminal state. Blocks; run it on a
/// blocking thread.
pub fn run(
    frames: &FrameStore,
    stop: &StopHandle,
    states: &watch::Receiver<PrintState>,
) -> io::Result<()> {
    let _raw = RawMode::enable()?;

    while !states.borrow().is_terminal() {
        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        match action_for(&key) {
            Some(KeyAction::Next) => {
                if let Some(id) = frames.acknowledge_current() {
                    info!(sequence_id = id, "frame acknowledged from keyboard");
                }
            }
            Some(KeyAction::Stop) => {
                info!("stop requested from keyboard");
                stop.request_stop();
            }
            None => {}
        }
    }

    Ok(())
}

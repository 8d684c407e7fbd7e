//! Raw-mode terminal input on crossterm

use crate::input::{InputCloser, InputEvent, InputSource, Key};
use crate::logging;
use anyhow::{Context, Result};
use async_trait::async_trait;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Terminal in raw mode, read through crossterm's async event stream
pub struct TerminalInput {
    events: EventStream,
    raw: Arc<AtomicBool>,
}

impl TerminalInput {
    /// Put the terminal into raw mode
    pub fn open() -> Result<Self> {
        terminal::enable_raw_mode().context("enable raw mode")?;
        logging::set_raw_mode(true);
        debug!("[INPUT] Terminal in raw mode");

        Ok(Self {
            events: EventStream::new(),
            raw: Arc::new(AtomicBool::new(true)),
        })
    }
}

fn release(raw: &AtomicBool) {
    if !raw.swap(false, Ordering::SeqCst) {
        return;
    }
    logging::set_raw_mode(false);
    if let Err(e) = terminal::disable_raw_mode() {
        warn!("[INPUT] Failed to restore terminal: {}", e);
    }
}

impl Drop for TerminalInput {
    fn drop(&mut self) {
        release(&self.raw);
    }
}

#[async_trait]
impl InputSource for TerminalInput {
    async fn next_event(&mut self) -> InputEvent {
        match self.events.next().await {
            Some(Ok(event)) => translate(event),
            Some(Err(e)) => InputEvent::Error(e.to_string()),
            None => InputEvent::Error("terminal event stream closed".into()),
        }
    }

    fn closer(&self) -> InputCloser {
        let raw = self.raw.clone();
        Arc::new(move || release(&raw))
    }
}

/// Map a crossterm event to an input event
pub(crate) fn translate(event: Event) -> InputEvent {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => InputEvent::Key(translate_key(key)),
        _ => InputEvent::Other,
    }
}

fn translate_key(key: KeyEvent) -> Key {
    match key.code {
        KeyCode::Esc => Key::Esc,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Key::Interrupt,
        KeyCode::Char(_) if !key.modifiers.difference(KeyModifiers::SHIFT).is_empty() => Key::Other,
        KeyCode::Char(c) => Key::Char(c),
        _ => Key::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{command_for, DroneCommand};
    use crossterm::event::{KeyEventState, MouseEvent, MouseEventKind};

    fn press(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent::new(code, modifiers))
    }

    #[test]
    fn test_keys_translate() {
        assert_eq!(
            translate(press(KeyCode::Esc, KeyModifiers::NONE)),
            InputEvent::Key(Key::Esc)
        );
        assert_eq!(
            translate(press(KeyCode::Char('w'), KeyModifiers::NONE)),
            InputEvent::Key(Key::Char('w'))
        );
        assert_eq!(
            translate(press(KeyCode::Up, KeyModifiers::NONE)),
            InputEvent::Key(Key::Other)
        );
    }

    #[test]
    fn test_ctrl_c_is_interrupt() {
        assert_eq!(
            translate(press(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            InputEvent::Key(Key::Interrupt)
        );
        assert_eq!(
            translate(press(KeyCode::Char('c'), KeyModifiers::NONE)),
            InputEvent::Key(Key::Char('c'))
        );
    }

    #[test]
    fn test_modifier_chords_halt() {
        for modifiers in [KeyModifiers::CONTROL, KeyModifiers::ALT, KeyModifiers::SUPER] {
            for c in ['w', 't', 'd'] {
                assert_eq!(
                    translate(press(KeyCode::Char(c), modifiers)),
                    InputEvent::Key(Key::Other),
                    "{:?}+{}",
                    modifiers,
                    c
                );
            }
        }
        assert_eq!(command_for(Key::Other), DroneCommand::Halt);
        // Shifted letters are plain symbols, not chords
        assert_eq!(
            translate(press(KeyCode::Char('W'), KeyModifiers::SHIFT)),
            InputEvent::Key(Key::Char('W'))
        );
    }

    #[test]
    fn test_release_and_non_key_events_ignored() {
        let release = Event::Key(KeyEvent {
            code: KeyCode::Char('w'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        });
        assert_eq!(translate(release), InputEvent::Other);
        assert_eq!(translate(Event::Resize(80, 24)), InputEvent::Other);

        let mouse = Event::Mouse(MouseEvent {
            kind: MouseEventKind::Moved,
            column: 0,
            row: 0,
            modifiers: KeyModifiers::NONE,
        });
        assert_eq!(translate(mouse), InputEvent::Other);
    }
}

//! Interactive Input Module
//!
//! Discrete key events from the operator and the loop that feeds them to
//! the command dispatcher.

mod event_loop;
mod terminal;

pub use event_loop::{run_input_loop, LoopExit};
pub use terminal::TerminalInput;

use async_trait::async_trait;
use std::sync::Arc;

/// A key the operator pressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// The exit symbol
    Esc,
    Char(char),
    /// Ctrl+C while the terminal is raw
    Interrupt,
    /// Any other special key
    Other,
}

/// One event from the input source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Key(Key),
    /// Resize, mouse, key release and the like
    Other,
    /// The source failed and cannot produce more events
    Error(String),
}

/// Releases the input source. Safe to call more than once and from any task.
pub type InputCloser = Arc<dyn Fn() + Send + Sync>;

/// Source of discrete input events
#[async_trait]
pub trait InputSource: Send {
    /// Wait for the next event
    async fn next_event(&mut self) -> InputEvent;

    /// Handle that releases the source from outside the input loop
    fn closer(&self) -> InputCloser;
}

//! Foreground input loop

use crate::command::{command_for, dispatch};
use crate::input::{InputEvent, InputSource, Key};
use crate::lifecycle::wait_grounded;
use crate::session::Session;
use crate::transport::Link;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{info, warn};

/// Why the input loop returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    /// The operator pressed the exit key
    ExitRequested,
    /// Ctrl+C arrived as a key press
    Interrupted,
    /// The input source failed
    InputFailed(String),
    /// Cleanup started elsewhere
    Grounded,
}

/// Feed input events to the dispatcher until exit, failure or grounding.
///
/// Every handled event is followed by `interval` of quiet so commands are
/// never issued faster than the link can take them.
pub async fn run_input_loop<S, L>(
    source: &mut S,
    session: &Session<L>,
    interval: Duration,
    grounded: &mut watch::Receiver<bool>,
) -> LoopExit
where
    S: InputSource,
    L: Link + 'static,
{
    loop {
        let event = tokio::select! {
            biased;
            _ = wait_grounded(grounded) => return LoopExit::Grounded,
            event = source.next_event() => event,
        };

        match event {
            InputEvent::Key(Key::Esc) => {
                info!("Exiting...");
                return LoopExit::ExitRequested;
            }
            InputEvent::Key(Key::Interrupt) => {
                info!("Received interrupt. Exiting...");
                return LoopExit::Interrupted;
            }
            InputEvent::Key(key) => {
                if !dispatch(session, command_for(key)).await {
                    return LoopExit::Grounded;
                }
            }
            InputEvent::Other => {}
            InputEvent::Error(e) => {
                warn!("Terminal error: {}", e);
                return LoopExit::InputFailed(e);
            }
        }

        sleep(interval).await;
    }
}

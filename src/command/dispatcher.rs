//! Command dispatcher - maps keys to drone commands and issues them

use crate::input::Key;
use crate::session::Session;
use crate::transport::Link;
use minidrone_shared::piloting::{clamp_rotation, MOTION_STEP, ROTATION_REQUEST, ROTATION_SCALE};
use std::fmt;
use tracing::{info, warn};

/// Every command the keyboard can issue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DroneCommand {
    TakeOff,
    Land,
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
    RotateClockwise,
    RotateCounterClockwise,
    FrontFlip,
    BackFlip,
    LeftFlip,
    RightFlip,
    /// Stop all movement
    Halt,
}

impl DroneCommand {
    /// Status line shown when the command is issued
    pub fn status(self) -> Option<&'static str> {
        let status = match self {
            DroneCommand::TakeOff => "Takeoff...",
            DroneCommand::Land => "Land...",
            DroneCommand::Forward => "Forward...",
            DroneCommand::Backward => "Backward...",
            DroneCommand::Left => "Left...",
            DroneCommand::Right => "Right...",
            DroneCommand::Up => "Up...",
            DroneCommand::Down => "Down...",
            DroneCommand::RotateClockwise => "Spin clockwise...",
            DroneCommand::RotateCounterClockwise => "Spin counter clockwise...",
            DroneCommand::FrontFlip => "Front flip...",
            DroneCommand::BackFlip => "Back flip...",
            DroneCommand::LeftFlip => "Left flip...",
            DroneCommand::RightFlip => "Right flip...",
            DroneCommand::Halt => return None,
        };
        Some(status)
    }
}

impl fmt::Display for DroneCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Map a key to its command. Total: anything unmapped halts.
pub fn command_for(key: Key) -> DroneCommand {
    let Key::Char(c) = key else {
        return DroneCommand::Halt;
    };

    match c {
        '[' => DroneCommand::TakeOff,
        ']' => DroneCommand::Land,
        'w' => DroneCommand::Forward,
        's' => DroneCommand::Backward,
        'a' => DroneCommand::Left,
        'd' => DroneCommand::Right,
        'i' => DroneCommand::Up,
        'k' => DroneCommand::Down,
        'j' => DroneCommand::RotateCounterClockwise,
        'l' => DroneCommand::RotateClockwise,
        't' => DroneCommand::FrontFlip,
        'g' => DroneCommand::BackFlip,
        'f' => DroneCommand::LeftFlip,
        'h' => DroneCommand::RightFlip,
        _ => DroneCommand::Halt,
    }
}

/// Issue one command on the session.
///
/// Returns `false` when the session no longer accepts commands. Send
/// failures are logged and otherwise ignored.
pub async fn dispatch<L: Link + 'static>(session: &Session<L>, command: DroneCommand) -> bool {
    let Some(pilot) = session.pilot().await else {
        return false;
    };

    if let Some(status) = command.status() {
        info!("{}", status);
    }

    let spin = clamp_rotation(ROTATION_REQUEST, ROTATION_SCALE);
    let result = match command {
        DroneCommand::TakeOff => pilot.take_off().await,
        DroneCommand::Land => pilot.land().await,
        DroneCommand::Forward => pilot.forward(MOTION_STEP).await,
        DroneCommand::Backward => pilot.backward(MOTION_STEP).await,
        DroneCommand::Left => pilot.left(MOTION_STEP).await,
        DroneCommand::Right => pilot.right(MOTION_STEP).await,
        DroneCommand::Up => pilot.up(MOTION_STEP).await,
        DroneCommand::Down => pilot.down(MOTION_STEP).await,
        DroneCommand::RotateClockwise => pilot.clockwise(spin).await,
        DroneCommand::RotateCounterClockwise => pilot.counter_clockwise(spin).await,
        DroneCommand::FrontFlip => pilot.front_flip().await,
        DroneCommand::BackFlip => pilot.back_flip().await,
        DroneCommand::LeftFlip => pilot.left_flip().await,
        DroneCommand::RightFlip => pilot.right_flip().await,
        DroneCommand::Halt => pilot.halt().await,
    };

    if let Err(e) = result {
        warn!("[PILOT] {} failed: {:#}", command, e);
    }
    true
}

//! Minidrone command framing
//!
//! Every frame written to or received from the drone has the layout:
//! ```text
//! [ kind: u8 ][ seq: u8 ][ project: u8 ][ class: u8 ][ command: u16 LE ][ args... ]
//! ```
//!
//! Sequence numbers are tracked per outbound channel and wrap at 255.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use thiserror::Error;

/// Length of the fixed frame header
pub const HEADER_LEN: usize = 6;

/// Project identifiers
pub mod project {
    pub const COMMON: u8 = 0;
    pub const MINIDRONE: u8 = 2;
}

/// Class identifiers used by this client
pub mod class {
    /// Minidrone piloting commands
    pub const PILOTING: u8 = 0;
    /// Minidrone piloting state notifications
    pub const PILOTING_STATE: u8 = 3;
    /// Minidrone animations (flips)
    pub const ANIMATIONS: u8 = 4;
    /// Common project: general commands
    pub const COMMON: u8 = 4;
    /// Common project: general state notifications
    pub const COMMON_STATE: u8 = 5;
}

/// Piloting state notification identifiers (the `state` half of a state change)
pub mod piloting_state {
    pub const FLAT_TRIM_CHANGED: u16 = 0;
    pub const FLYING_STATE_CHANGED: u16 = 1;
    pub const ALERT_STATE_CHANGED: u16 = 2;
}

const CMD_FLAT_TRIM: u16 = 0;
const CMD_TAKE_OFF: u16 = 1;
const CMD_PCMD: u16 = 2;
const CMD_LANDING: u16 = 3;
const CMD_FLIP: u16 = 0;
const CMD_ALL_STATES: u16 = 0;
const CMD_BATTERY_STATE_CHANGED: u16 = 1;

/// Errors that can occur while decoding a frame
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Frame too short: {0} bytes (header is {header})", header = HEADER_LEN)]
    TooShort(usize),

    #[error("Unknown frame kind: {0:#04x}")]
    UnknownKind(u8),

    #[error("Missing argument bytes: need {needed}, have {available}")]
    MissingArguments { needed: usize, available: usize },

    #[error("Invalid flip direction: {0}")]
    InvalidFlipDirection(u32),
}

/// Frame kind, the first byte of every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    Ack = 0x01,
    Data = 0x02,
    LowLatency = 0x03,
    DataWithAck = 0x04,
}

impl TryFrom<u8> for FrameKind {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(FrameKind::Ack),
            0x02 => Ok(FrameKind::Data),
            0x03 => Ok(FrameKind::LowLatency),
            0x04 => Ok(FrameKind::DataWithAck),
            other => Err(CodecError::UnknownKind(other)),
        }
    }
}

/// Logical GATT channels of the drone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Outbound PCMD (continuous piloting) channel
    Piloting,
    /// Outbound general command channel
    Command,
    /// Inbound flight status notifications
    FlightStatus,
    /// Inbound battery notifications
    Battery,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Piloting => write!(f, "piloting"),
            Channel::Command => write!(f, "command"),
            Channel::FlightStatus => write!(f, "flight-status"),
            Channel::Battery => write!(f, "battery"),
        }
    }
}

/// Piloting command payload. Axis values are signed percents.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pcmd {
    /// Set when roll/pitch should be applied
    pub flag: bool,
    pub roll: i8,
    pub pitch: i8,
    pub yaw: i8,
    pub gaz: i8,
    pub psi: f32,
}

impl Pcmd {
    /// A zeroed command: hold position, no movement
    pub fn stop() -> Self {
        Self::default()
    }

    /// Check if this command carries no movement at all
    pub fn is_stop(&self) -> bool {
        !self.flag && self.roll == 0 && self.pitch == 0 && self.yaw == 0 && self.gaz == 0
    }
}

/// Flip animation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FlipDirection {
    Front = 0,
    Back = 1,
    Right = 2,
    Left = 3,
}

impl TryFrom<u32> for FlipDirection {
    type Error = CodecError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FlipDirection::Front),
            1 => Ok(FlipDirection::Back),
            2 => Ok(FlipDirection::Right),
            3 => Ok(FlipDirection::Left),
            other => Err(CodecError::InvalidFlipDirection(other)),
        }
    }
}

/// Commands this client knows how to send
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArCommand {
    /// Ask the drone to report all of its states
    AllStates,
    FlatTrim,
    TakeOff,
    Land,
    Piloting(Pcmd),
    Flip(FlipDirection),
}

impl ArCommand {
    /// Channel the command is written to
    pub fn channel(&self) -> Channel {
        match self {
            ArCommand::Piloting(_) => Channel::Piloting,
            _ => Channel::Command,
        }
    }

    /// Frame kind used for the command
    pub fn kind(&self) -> FrameKind {
        match self {
            ArCommand::AllStates => FrameKind::DataWithAck,
            _ => FrameKind::Data,
        }
    }

    fn id(&self) -> (u8, u8, u16) {
        match self {
            ArCommand::AllStates => (project::COMMON, class::COMMON, CMD_ALL_STATES),
            ArCommand::FlatTrim => (project::MINIDRONE, class::PILOTING, CMD_FLAT_TRIM),
            ArCommand::TakeOff => (project::MINIDRONE, class::PILOTING, CMD_TAKE_OFF),
            ArCommand::Land => (project::MINIDRONE, class::PILOTING, CMD_LANDING),
            ArCommand::Piloting(_) => (project::MINIDRONE, class::PILOTING, CMD_PCMD),
            ArCommand::Flip(_) => (project::MINIDRONE, class::ANIMATIONS, CMD_FLIP),
        }
    }

    fn put_args(&self, buf: &mut BytesMut) {
        match self {
            ArCommand::Piloting(pcmd) => {
                buf.put_u8(pcmd.flag as u8);
                buf.put_i8(pcmd.roll);
                buf.put_i8(pcmd.pitch);
                buf.put_i8(pcmd.yaw);
                buf.put_i8(pcmd.gaz);
                buf.put_f32_le(pcmd.psi);
            }
            ArCommand::Flip(direction) => buf.put_u32_le(*direction as u32),
            _ => {}
        }
    }

    /// Recognize an outbound frame as one of the known commands.
    ///
    /// Returns `Ok(None)` for well-formed frames this client never sends.
    pub fn from_frame(frame: &Frame) -> Result<Option<Self>, CodecError> {
        let mut args = frame.args.clone();

        let command = match (frame.project, frame.class, frame.command) {
            (project::COMMON, class::COMMON, CMD_ALL_STATES) => ArCommand::AllStates,
            (project::MINIDRONE, class::PILOTING, CMD_FLAT_TRIM) => ArCommand::FlatTrim,
            (project::MINIDRONE, class::PILOTING, CMD_TAKE_OFF) => ArCommand::TakeOff,
            (project::MINIDRONE, class::PILOTING, CMD_LANDING) => ArCommand::Land,
            (project::MINIDRONE, class::PILOTING, CMD_PCMD) => {
                require(&args, 9)?;
                ArCommand::Piloting(Pcmd {
                    flag: args.get_u8() != 0,
                    roll: args.get_i8(),
                    pitch: args.get_i8(),
                    yaw: args.get_i8(),
                    gaz: args.get_i8(),
                    psi: args.get_f32_le(),
                })
            }
            (project::MINIDRONE, class::ANIMATIONS, CMD_FLIP) => {
                require(&args, 4)?;
                ArCommand::Flip(FlipDirection::try_from(args.get_u32_le())?)
            }
            _ => return Ok(None),
        };

        Ok(Some(command))
    }
}

fn require(args: &Bytes, needed: usize) -> Result<(), CodecError> {
    if args.len() < needed {
        return Err(CodecError::MissingArguments {
            needed,
            available: args.len(),
        });
    }
    Ok(())
}

/// A decoded frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub kind: FrameKind,
    pub seq: u8,
    pub project: u8,
    pub class: u8,
    pub command: u16,
    pub args: Bytes,
}

impl Frame {
    /// Decode a frame from a single GATT value
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        if data.len() < HEADER_LEN {
            return Err(CodecError::TooShort(data.len()));
        }

        let mut buf = data;
        let kind = FrameKind::try_from(buf.get_u8())?;
        let seq = buf.get_u8();
        let project = buf.get_u8();
        let class = buf.get_u8();
        let command = buf.get_u16_le();

        Ok(Self {
            kind,
            seq,
            project,
            class,
            command,
            args: Bytes::copy_from_slice(buf),
        })
    }
}

/// Encoder that stamps per-channel sequence numbers on outbound frames
#[derive(Debug, Default)]
pub struct FrameEncoder {
    piloting_seq: u8,
    command_seq: u8,
}

impl FrameEncoder {
    /// Create a new encoder with both sequences at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a command into a frame ready to be written to its channel
    pub fn encode(&mut self, command: &ArCommand) -> Bytes {
        let seq = self.next_seq(command.channel());
        let (project, class, id) = command.id();

        let mut buf = BytesMut::with_capacity(HEADER_LEN + 9);
        buf.put_u8(command.kind() as u8);
        buf.put_u8(seq);
        buf.put_u8(project);
        buf.put_u8(class);
        buf.put_u16_le(id);
        command.put_args(&mut buf);

        buf.freeze()
    }

    fn next_seq(&mut self, channel: Channel) -> u8 {
        let counter = match channel {
            Channel::Piloting => &mut self.piloting_seq,
            _ => &mut self.command_seq,
        };
        *counter = counter.wrapping_add(1);
        *counter
    }
}

/// Reported flying state of the drone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlyingState {
    Landed,
    TakingOff,
    Hovering,
    Flying,
    Landing,
    Emergency,
    Rolling,
    Init,
    Unknown(u32),
}

impl From<u32> for FlyingState {
    fn from(value: u32) -> Self {
        match value {
            0 => FlyingState::Landed,
            1 => FlyingState::TakingOff,
            2 => FlyingState::Hovering,
            3 => FlyingState::Flying,
            4 => FlyingState::Landing,
            5 => FlyingState::Emergency,
            6 => FlyingState::Rolling,
            7 => FlyingState::Init,
            other => FlyingState::Unknown(other),
        }
    }
}

impl fmt::Display for FlyingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlyingState::Landed => write!(f, "landed"),
            FlyingState::TakingOff => write!(f, "takingoff"),
            FlyingState::Hovering => write!(f, "hovering"),
            FlyingState::Flying => write!(f, "flying"),
            FlyingState::Landing => write!(f, "landing"),
            FlyingState::Emergency => write!(f, "emergency"),
            FlyingState::Rolling => write!(f, "rolling"),
            FlyingState::Init => write!(f, "init"),
            FlyingState::Unknown(value) => write!(f, "unknown({})", value),
        }
    }
}

/// Notifications the drone pushes to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Piloting state change as `(state, substate)`
    PilotingState { state: u16, substate: u32 },
    /// Battery level in percent
    Battery(u8),
    /// Anything else, kept for logging
    Other { project: u8, class: u8, command: u16 },
}

impl Notification {
    /// Interpret a decoded inbound frame
    pub fn from_frame(frame: &Frame) -> Result<Self, CodecError> {
        match (frame.project, frame.class) {
            (project::MINIDRONE, class::PILOTING_STATE) => Ok(Notification::PilotingState {
                state: frame.command,
                substate: first_arg(&frame.args),
            }),
            (project::COMMON, class::COMMON_STATE) if frame.command == CMD_BATTERY_STATE_CHANGED => {
                require(&frame.args, 1)?;
                Ok(Notification::Battery(frame.args[0]))
            }
            _ => Ok(Notification::Other {
                project: frame.project,
                class: frame.class,
                command: frame.command,
            }),
        }
    }

    /// The flying state carried by this notification, if it is a flying state change
    pub fn flying_state(&self) -> Option<FlyingState> {
        match self {
            Notification::PilotingState { state, substate }
                if *state == piloting_state::FLYING_STATE_CHANGED =>
            {
                Some(FlyingState::from(*substate))
            }
            _ => None,
        }
    }
}

/// Enum arguments are u32 LE; shorter payloads carry a single byte
fn first_arg(args: &Bytes) -> u32 {
    if args.len() >= 4 {
        u32::from_le_bytes([args[0], args[1], args[2], args[3]])
    } else {
        args.first().copied().map(u32::from).unwrap_or(0)
    }
}

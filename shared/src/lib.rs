//! Minidrone Shared Types
//!
//! This crate provides the command framing, notification decoding and
//! lifecycle state machine shared by the pilot binary and its tests.
//! Nothing in here performs I/O.

pub mod codec;
pub mod state_machine;

pub use codec::{
    ArCommand, Channel, CodecError, FlipDirection, FlyingState, Frame, FrameEncoder, FrameKind,
    Notification, Pcmd,
};
pub use state_machine::{LifecycleEvent, LifecycleMachine, LifecycleState, TransitionResult};

/// Timing parameters for a piloting session
pub mod timing {
    /// How long to scan for the target before giving up gracefully
    pub const SCAN_TIMEOUT_SECS: u64 = 30;

    /// Minimum pause between two dispatched input events
    pub const COMMAND_INTERVAL_MS: u64 = 100;

    /// Stabilization delay between the control handshake and automatic takeoff
    pub const TAKEOFF_DELAY_SECS: u64 = 3;

    /// Wait between land and halt during interactive cleanup
    pub const LAND_SETTLE_SECS: u64 = 2;

    /// Wait between land and halt during monitor cleanup
    pub const MONITOR_LAND_SETTLE_SECS: u64 = 3;

    /// Pause between connection attempts in monitor mode
    pub const CONNECT_RETRY_SECS: u64 = 1;
}

/// Piloting limits and default magnitudes
pub mod piloting {
    /// Largest magnitude accepted by the drone for any PCMD axis (percent)
    pub const MAX_PERCENT: u8 = 100;

    /// Magnitude used by the interactive directional keys
    pub const MOTION_STEP: u8 = 1;

    /// Requested spin value for the interactive rotation keys
    pub const ROTATION_REQUEST: f64 = 20.0;

    /// Scale the rotation request is normalized against
    pub const ROTATION_SCALE: f64 = 10.0;

    /// Normalized values below this are treated as no rotation
    pub const ROTATION_DEAD_ZONE: f64 = 0.1;

    /// Convert a requested rotation into a percent the drone accepts.
    ///
    /// The request is normalized against `scale`. Anything under the dead zone
    /// becomes 0 and anything above the scale saturates at [`MAX_PERCENT`].
    /// Out-of-range requests are clamped, never rejected.
    pub fn clamp_rotation(requested: f64, scale: f64) -> u8 {
        if !requested.is_finite() || !scale.is_finite() || scale <= 0.0 {
            return 0;
        }

        let value = requested.abs() / scale;
        if value < ROTATION_DEAD_ZONE {
            0
        } else if value <= 1.0 {
            // Truncate to whole percents
            (value * 100.0) as u8
        } else {
            MAX_PERCENT
        }
    }

    /// Clamp a motion magnitude into the accepted range
    pub fn clamp_magnitude(magnitude: u8) -> u8 {
        magnitude.min(MAX_PERCENT)
    }
}

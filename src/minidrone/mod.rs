//! Minidrone Client Module
//!
//! Thin client for Parrot minidrones: command encoding on the way out and
//! notification decoding on the way in. Framing lives in `minidrone-shared`.

mod commands;
mod telemetry;

pub use commands::CommandSender;
pub use telemetry::{log_piloting_state, TelemetryReader};

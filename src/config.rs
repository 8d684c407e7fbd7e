//! Command line and runtime configuration

use crate::error::PilotError;
use crate::transport::TargetAddress;
use clap::{Parser, ValueEnum};
use minidrone_shared::timing;
use std::fmt;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "minidrone-pilot")]
#[command(about = "Fly a Parrot minidrone over Bluetooth Low Energy")]
#[command(version)]
pub struct Cli {
    /// Bluetooth address of the minidrone, e.g. AA:BB:CC:DD:EE:FF
    #[arg(value_name = "ADDRESS")]
    pub address: Option<String>,

    /// Interactive keyboard control, or passive state monitoring
    #[arg(long, value_enum, default_value = "keyboard")]
    pub variant: Variant,

    /// Seconds to scan for the drone before giving up
    #[arg(long, value_name = "SECS", default_value_t = timing::SCAN_TIMEOUT_SECS)]
    pub scan_timeout: u64,

    /// Minimum milliseconds between two dispatched keys
    #[arg(long, value_name = "MS", default_value_t = timing::COMMAND_INTERVAL_MS)]
    pub command_interval: u64,

    /// Seconds between the control handshake and automatic takeoff
    #[arg(long, value_name = "SECS", default_value_t = timing::TAKEOFF_DELAY_SECS)]
    pub takeoff_delay: u64,

    /// Seconds between land and halt during cleanup (default depends on variant)
    #[arg(long, value_name = "SECS")]
    pub settle_delay: Option<u64>,

    /// Seconds between connection attempts in monitor mode
    #[arg(long, value_name = "SECS", default_value_t = timing::CONNECT_RETRY_SECS)]
    pub retry_interval: u64,
}

/// How the session is driven once connected
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Variant {
    /// Keyboard piloting with automatic takeoff; connect failures are fatal
    #[default]
    Keyboard,
    /// Log drone state until interrupted; connect failures are retried
    Monitor,
}

impl Variant {
    /// Land-to-halt settle delay used when none is configured
    pub fn default_settle_delay(self) -> Duration {
        match self {
            Variant::Keyboard => Duration::from_secs(timing::LAND_SETTLE_SECS),
            Variant::Monitor => Duration::from_secs(timing::MONITOR_LAND_SETTLE_SECS),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Keyboard => write!(f, "keyboard"),
            Variant::Monitor => write!(f, "monitor"),
        }
    }
}

/// Timing and policy for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PilotConfig {
    pub variant: Variant,
    pub scan_timeout: Duration,
    pub command_interval: Duration,
    pub takeoff_delay: Duration,
    pub settle_delay: Duration,
    pub retry_interval: Duration,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            variant: Variant::Keyboard,
            scan_timeout: Duration::from_secs(timing::SCAN_TIMEOUT_SECS),
            command_interval: Duration::from_millis(timing::COMMAND_INTERVAL_MS),
            takeoff_delay: Duration::from_secs(timing::TAKEOFF_DELAY_SECS),
            settle_delay: Variant::Keyboard.default_settle_delay(),
            retry_interval: Duration::from_secs(timing::CONNECT_RETRY_SECS),
        }
    }
}

impl Cli {
    /// Split the parsed command line into the target and the run configuration
    pub fn into_parts(self) -> Result<(TargetAddress, PilotConfig), PilotError> {
        let target = self
            .address
            .and_then(TargetAddress::new)
            .ok_or(PilotError::MissingTarget)?;

        let config = PilotConfig {
            variant: self.variant,
            scan_timeout: Duration::from_secs(self.scan_timeout),
            command_interval: Duration::from_millis(self.command_interval),
            takeoff_delay: Duration::from_secs(self.takeoff_delay),
            settle_delay: self
                .settle_delay
                .map(Duration::from_secs)
                .unwrap_or_else(|| self.variant.default_settle_delay()),
            retry_interval: Duration::from_secs(self.retry_interval),
        };

        Ok((target, config))
    }
}

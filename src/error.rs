//! Fatal setup errors and their process exit codes

use thiserror::Error;

/// Usage line printed when no target address is given
pub const USAGE: &str = "you must pass the Bluetooth address of the minidrone you want to connect to as the first argument";

/// Errors that end the process before a piloting session can run
#[derive(Error, Debug)]
pub enum PilotError {
    #[error("{}", USAGE)]
    MissingTarget,

    #[error("Failed to enable BLE interface: {0:#}")]
    EnableAdapter(anyhow::Error),

    #[error("Failed to start scan: {0:#}")]
    StartScan(anyhow::Error),

    #[error("Failed to connect to device {address}: {cause:#}")]
    Connect { address: String, cause: anyhow::Error },

    #[error("Failed to initialize terminal: {0:#}")]
    InitTerminal(anyhow::Error),
}

impl PilotError {
    /// Exit status reported to the shell
    pub fn exit_code(&self) -> u8 {
        1
    }
}

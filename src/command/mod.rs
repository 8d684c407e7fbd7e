//! Command dispatch for interactive piloting
//!
//! This module handles:
//! - Mapping a pressed key to exactly one drone command
//! - Falling back to halt for anything unmapped
//! - Issuing the command through the session's command gate

mod dispatcher;

pub use dispatcher::{command_for, dispatch, DroneCommand};

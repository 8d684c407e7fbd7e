//! Session Module
//!
//! The single live drone connection and the command gate around it.

mod handle;

pub use handle::{Pilot, Session};

//! Lifecycle Module
//!
//! Drives one run from scan to disconnect and owns the single cleanup path
//! shared by normal exit, input failure and OS signals.

mod controller;
mod signals;

pub use controller::{ExitReason, LifecycleController};
pub use signals::ShutdownSignals;

use tokio::sync::watch;

/// Resolve once the grounded latch is set (or its sender is gone)
pub(crate) async fn wait_grounded(grounded: &mut watch::Receiver<bool>) {
    loop {
        if *grounded.borrow_and_update() {
            return;
        }
        if grounded.changed().await.is_err() {
            return;
        }
    }
}

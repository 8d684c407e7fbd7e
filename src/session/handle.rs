//! Session handle: the connected link plus its command client

use crate::minidrone::{CommandSender, TelemetryReader};
use crate::transport::Link;
use anyhow::Result;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A live connection to the drone.
///
/// Motion commands go through [`Session::pilot`], which stops handing out
/// access once the session has been grounded. Cleanup uses the ungated
/// [`Session::land`] and [`Session::halt`].
pub struct Session<L: Link> {
    link: Arc<L>,
    commands: CommandSender<L>,
    telemetry: Arc<TelemetryReader>,
    accepting: Mutex<bool>,
    closed: AtomicBool,
    pump: Mutex<Option<JoinHandle<()>>>,
}

/// Exclusive access to the command client while the session accepts motion
pub struct Pilot<'a, L: Link> {
    _gate: MutexGuard<'a, bool>,
    commands: &'a CommandSender<L>,
}

impl<L: Link> Deref for Pilot<'_, L> {
    type Target = CommandSender<L>;

    fn deref(&self) -> &Self::Target {
        self.commands
    }
}

impl<L: Link + 'static> Session<L> {
    pub fn new(link: L) -> Self {
        let link = Arc::new(link);
        Self {
            commands: CommandSender::new(link.clone()),
            link,
            telemetry: Arc::new(TelemetryReader::new()),
            accepting: Mutex::new(true),
            closed: AtomicBool::new(false),
            pump: Mutex::new(None),
        }
    }

    pub fn address(&self) -> &str {
        self.link.address()
    }

    pub fn telemetry(&self) -> &TelemetryReader {
        &self.telemetry
    }

    /// Handshake required before the drone accepts piloting commands:
    /// subscribe to notifications, request all states, flat trim.
    pub async fn start_control_channel(&self) -> Result<()> {
        let notifications = self.link.subscribe().await?;

        let telemetry = self.telemetry.clone();
        let pump = tokio::spawn(async move { telemetry.run(notifications).await });
        if let Some(previous) = self.pump.lock().await.replace(pump) {
            previous.abort();
        }

        self.commands.request_all_states().await?;
        self.commands.flat_trim().await?;
        info!("[PILOT] Control channel started with {}", self.address());
        Ok(())
    }

    /// Register the `(state, substate)` callback for piloting state changes
    pub async fn on_piloting_state_change<F>(&self, callback: F)
    where
        F: Fn(u16, u32) + Send + Sync + 'static,
    {
        self.telemetry.on_piloting_state_change(callback).await;
    }

    /// Command access, or `None` once the session has been grounded
    pub async fn pilot(&self) -> Option<Pilot<'_, L>> {
        let gate = self.accepting.lock().await;
        if !*gate {
            return None;
        }
        Some(Pilot {
            _gate: gate,
            commands: &self.commands,
        })
    }

    /// Stop handing out command access. Waits for an in-flight command to finish.
    pub async fn ground(&self) {
        let mut gate = self.accepting.lock().await;
        if *gate {
            *gate = false;
            debug!("[PILOT] Session grounded");
        }
    }

    pub async fn land(&self) -> Result<()> {
        self.commands.land().await
    }

    pub async fn halt(&self) -> Result<()> {
        self.commands.halt().await
    }

    /// Disconnect the link. Only the first call has any effect.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(pump) = self.pump.lock().await.take() {
            pump.abort();
        }

        if let Err(e) = self.link.disconnect().await {
            warn!("[BLE] Disconnect from {} failed: {:#}", self.address(), e);
            return Err(e);
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

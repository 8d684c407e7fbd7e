//! Peer discovery: scan until the target address shows up

use crate::error::PilotError;
use crate::transport::traits::{DiscoveredPeer, Radio, ScanControl, ScanHandler};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Hardware address of the drone to fly, as given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetAddress(String);

impl TargetAddress {
    /// Returns `None` for an empty or blank address
    pub fn new(address: impl Into<String>) -> Option<Self> {
        let address = address.into();
        if address.trim().is_empty() {
            return None;
        }
        Some(Self(address))
    }

    /// Exact comparison against an observed address
    pub fn matches(&self, address: &str) -> bool {
        self.0 == address
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a discovery run that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocateOutcome {
    Found(DiscoveredPeer),
    /// No match within the scan timeout (not an error)
    TimedOut,
}

/// Finds a single peer by address
pub struct PeerLocator<'a, R: Radio> {
    radio: &'a R,
    scan_timeout: Duration,
}

impl<'a, R: Radio> PeerLocator<'a, R> {
    pub fn new(radio: &'a R, scan_timeout: Duration) -> Self {
        Self {
            radio,
            scan_timeout,
        }
    }

    /// Enable the adapter, scan, and hand back the first matching peer
    pub async fn locate(&self, target: &TargetAddress) -> Result<LocateOutcome, PilotError> {
        info!("[BLE] Enabling Bluetooth...");
        self.radio.enable().await.map_err(PilotError::EnableAdapter)?;

        info!("[SCAN] Starting scan for {}...", target);
        let (slot_tx, mut slot_rx) = mpsc::channel(1);
        self.radio
            .scan(match_handler(target.clone(), slot_tx))
            .await
            .map_err(PilotError::StartScan)?;

        let outcome = match timeout(self.scan_timeout, slot_rx.recv()).await {
            Ok(Some(peer)) => LocateOutcome::Found(peer),
            Ok(None) => {
                warn!("[SCAN] Scan ended without a matching device");
                LocateOutcome::TimedOut
            }
            Err(_) => {
                info!("[SCAN] Scan timeout. No matching device found.");
                LocateOutcome::TimedOut
            }
        };

        self.radio.stop_scan().await;
        Ok(outcome)
    }
}

/// Build the scan callback for `target`.
///
/// The first matching advertisement is published into the single-slot
/// `slot` and the scan is told to stop. Later calls publish nothing, and a
/// publish never blocks even if the receiver is gone.
pub fn match_handler(target: TargetAddress, slot: mpsc::Sender<DiscoveredPeer>) -> ScanHandler {
    let mut published = false;

    Box::new(move |peer: &DiscoveredPeer| {
        if published {
            return ScanControl::Stop;
        }
        if !target.matches(&peer.address) {
            return ScanControl::Continue;
        }

        published = true;
        if slot.try_send(peer.clone()).is_err() {
            debug!("[SCAN] Nobody waiting for {}", peer.address);
        }
        ScanControl::Stop
    })
}

//! Transport trait abstraction for the radio and the drone link

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use minidrone_shared::Channel;
use std::fmt;
use tokio::sync::mpsc;

/// A peer seen while scanning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPeer {
    /// Hardware address in its string form
    pub address: String,
    /// Signal strength (if available)
    pub rssi: Option<i16>,
    /// Advertised local name (if any)
    pub name: Option<String>,
}

impl fmt::Display for DiscoveredPeer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Device: {}, RSSI: ", self.address)?;
        match self.rssi {
            Some(rssi) => write!(f, "{}", rssi)?,
            None => write!(f, "n/a")?,
        }
        write!(f, ", Name: {}", self.name.as_deref().unwrap_or(""))
    }
}

/// What the scan should do after an advertisement was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanControl {
    Continue,
    Stop,
}

/// Callback invoked once per advertisement observed during a scan
pub type ScanHandler = Box<dyn FnMut(&DiscoveredPeer) -> ScanControl + Send>;

/// The local wireless adapter
#[async_trait]
pub trait Radio: Send + Sync {
    /// The link type produced by a successful connect
    type Link: Link + 'static;

    /// Power up the adapter
    async fn enable(&self) -> Result<()>;

    /// Start scanning in the background; returns once the scan is running
    async fn scan(&self, handler: ScanHandler) -> Result<()>;

    /// Stop a running scan. No-op when nothing is scanning.
    async fn stop_scan(&self);

    /// Connect to a peer with default connection parameters (single attempt)
    async fn connect(&self, peer: &DiscoveredPeer) -> Result<Self::Link>;
}

/// An established connection to the drone
#[async_trait]
pub trait Link: Send + Sync {
    /// Address of the connected peer
    fn address(&self) -> &str;

    /// Write one frame to an outbound channel
    async fn write(&self, channel: Channel, frame: Bytes) -> Result<()>;

    /// Subscribe to the inbound channels
    async fn subscribe(&self) -> Result<mpsc::Receiver<(Channel, Bytes)>>;

    /// Tear down the connection
    async fn disconnect(&self) -> Result<()>;
}

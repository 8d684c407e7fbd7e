//! Minidrone Telemetry Reader
//!
//! Decodes notifications pushed by the drone, keeps the latest flying state
//! and battery level, and forwards piloting state changes to a callback.

use bytes::Bytes;
use minidrone_shared::codec::piloting_state;
use minidrone_shared::{Channel, FlyingState, Frame, Notification};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

/// Callback receiving piloting state changes as `(state, substate)`
pub type StateChangeCallback = Box<dyn Fn(u16, u32) + Send + Sync>;

/// Latest values reported by the drone
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Telemetry {
    pub flying_state: Option<FlyingState>,
    pub battery_percent: Option<u8>,
}

/// Reads drone notifications
#[derive(Default)]
pub struct TelemetryReader {
    telemetry: RwLock<Telemetry>,
    on_piloting_state: RwLock<Option<StateChangeCallback>>,
}

impl TelemetryReader {
    /// Create a new telemetry reader
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the piloting state callback, replacing any previous one
    pub async fn on_piloting_state_change<F>(&self, callback: F)
    where
        F: Fn(u16, u32) + Send + Sync + 'static,
    {
        *self.on_piloting_state.write().await = Some(Box::new(callback));
    }

    /// Snapshot of the latest values
    pub async fn get_telemetry(&self) -> Telemetry {
        *self.telemetry.read().await
    }

    /// Process one raw notification
    pub async fn process_frame(&self, channel: Channel, data: &[u8]) {
        let notification = match Frame::decode(data).and_then(|frame| Notification::from_frame(&frame)) {
            Ok(notification) => notification,
            Err(e) => {
                debug!("[TELEMETRY] Ignoring {} frame: {}", channel, e);
                return;
            }
        };

        match notification {
            Notification::PilotingState { state, substate } => {
                if let Some(flying_state) = notification.flying_state() {
                    self.telemetry.write().await.flying_state = Some(flying_state);
                }
                if let Some(callback) = self.on_piloting_state.read().await.as_ref() {
                    callback(state, substate);
                }
            }
            Notification::Battery(percent) => {
                self.telemetry.write().await.battery_percent = Some(percent);
                info!("[TELEMETRY] Battery: {}%", percent);
            }
            Notification::Other {
                project,
                class,
                command,
            } => {
                debug!(
                    "[TELEMETRY] Unhandled notification: project={} class={} command={}",
                    project, class, command
                );
            }
        }
    }

    /// Drain a notification subscription until the link goes away
    pub async fn run(&self, mut notifications: mpsc::Receiver<(Channel, Bytes)>) {
        while let Some((channel, data)) = notifications.recv().await {
            self.process_frame(channel, &data).await;
        }
        debug!("[TELEMETRY] Notification stream closed");
    }
}

/// Default piloting state logger
pub fn log_piloting_state(state: u16, substate: u32) {
    if state == piloting_state::FLYING_STATE_CHANGED {
        info!("FlightStateChange {}", FlyingState::from(substate));
    } else {
        info!("PilotingStateChange {} {}", state, substate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    const HOVERING: [u8; 10] = [0x04, 0x01, 0x02, 0x03, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00];
    const BATTERY_64: [u8; 7] = [0x04, 0x01, 0x00, 0x05, 0x01, 0x00, 0x40];

    #[tokio::test]
    async fn test_flying_state_tracked_and_reported() {
        let reader = TelemetryReader::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        reader
            .on_piloting_state_change(move |state, substate| {
                sink.lock().unwrap().push((state, substate));
            })
            .await;

        reader.process_frame(Channel::FlightStatus, &HOVERING).await;

        assert_eq!(
            reader.get_telemetry().await.flying_state,
            Some(FlyingState::Hovering)
        );
        assert_eq!(*seen.lock().unwrap(), vec![(1, 2)]);
    }

    #[tokio::test]
    async fn test_battery_tracked() {
        let reader = TelemetryReader::new();
        reader.process_frame(Channel::Battery, &BATTERY_64).await;
        assert_eq!(reader.get_telemetry().await.battery_percent, Some(64));
    }

    #[tokio::test]
    async fn test_garbage_is_ignored() {
        let reader = TelemetryReader::new();
        reader.process_frame(Channel::FlightStatus, &[0xff, 0x00]).await;
        assert_eq!(reader.get_telemetry().await, Telemetry::default());
    }

    #[tokio::test]
    async fn test_run_drains_until_closed() {
        let reader = TelemetryReader::new();
        let (tx, rx) = mpsc::channel(4);
        tx.send((Channel::Battery, Bytes::from_static(&BATTERY_64)))
            .await
            .unwrap();
        tx.send((Channel::FlightStatus, Bytes::from_static(&HOVERING)))
            .await
            .unwrap();
        drop(tx);

        reader.run(rx).await;

        let telemetry = reader.get_telemetry().await;
        assert_eq!(telemetry.battery_percent, Some(64));
        assert_eq!(telemetry.flying_state, Some(FlyingState::Hovering));
    }
}

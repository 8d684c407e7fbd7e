//! BlueZ radio and GATT link for Parrot minidrones

use crate::transport::traits::{DiscoveredPeer, Link, Radio, ScanControl, ScanHandler};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use bluer::gatt::remote::{Characteristic, CharacteristicWriteRequest};
use bluer::gatt::WriteOp;
use bluer::{Adapter, AdapterEvent, Address, Device};
use bytes::Bytes;
use futures::StreamExt;
use minidrone_shared::Channel;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex, OnceCell};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::{uuid, Uuid};

/// Service carrying the outbound command characteristics
pub const COMMAND_SERVICE_UUID: Uuid = uuid!("9a66fa00-0800-9191-11e4-012d1540cb8e");
/// Service carrying the notification characteristics
pub const NOTIFICATION_SERVICE_UUID: Uuid = uuid!("9a66fb00-0800-9191-11e4-012d1540cb8e");

const PILOTING_CHAR_UUID: Uuid = uuid!("9a66fa0a-0800-9191-11e4-012d1540cb8e");
const COMMAND_CHAR_UUID: Uuid = uuid!("9a66fa0b-0800-9191-11e4-012d1540cb8e");
const FLIGHT_STATUS_CHAR_UUID: Uuid = uuid!("9a66fb0e-0800-9191-11e4-012d1540cb8e");
const BATTERY_CHAR_UUID: Uuid = uuid!("9a66fb0f-0800-9191-11e4-012d1540cb8e");

/// How long to wait for BlueZ to finish GATT discovery after connecting
const SERVICES_RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);
const SERVICES_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The default BlueZ adapter
#[derive(Default)]
pub struct BluezRadio {
    adapter: OnceCell<Adapter>,
    scan_task: Mutex<Option<JoinHandle<()>>>,
}

impl BluezRadio {
    pub fn new() -> Self {
        Self::default()
    }

    fn adapter(&self) -> Result<&Adapter> {
        self.adapter
            .get()
            .ok_or_else(|| anyhow!("Bluetooth adapter has not been enabled"))
    }
}

#[async_trait]
impl Radio for BluezRadio {
    type Link = BluezLink;

    async fn enable(&self) -> Result<()> {
        self.adapter
            .get_or_try_init(|| async {
                let session = bluer::Session::new().await?;
                let adapter = session.default_adapter().await?;
                adapter.set_powered(true).await?;
                info!("[BLE] Using adapter {}", adapter.name());
                Ok::<_, bluer::Error>(adapter)
            })
            .await?;
        Ok(())
    }

    async fn scan(&self, mut handler: ScanHandler) -> Result<()> {
        let adapter = self.adapter()?.clone();
        let (started_tx, started_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let events = match adapter.discover_devices().await {
                Ok(events) => {
                    let _ = started_tx.send(Ok(()));
                    events
                }
                Err(e) => {
                    let _ = started_tx.send(Err(e));
                    return;
                }
            };
            tokio::pin!(events);

            while let Some(event) = events.next().await {
                let AdapterEvent::DeviceAdded(addr) = event else {
                    continue;
                };
                let Ok(device) = adapter.device(addr) else {
                    continue;
                };

                let peer = DiscoveredPeer {
                    address: addr.to_string(),
                    rssi: device.rssi().await.ok().flatten(),
                    name: device.name().await.ok().flatten(),
                };
                info!("[SCAN] {}", peer);

                if handler(&peer) == ScanControl::Stop {
                    break;
                }
            }

            // Dropping the event stream ends discovery
            debug!("[SCAN] Discovery stream closed");
        });

        started_rx
            .await
            .map_err(|_| anyhow!("scan task ended before discovery started"))??;

        *self.scan_task.lock().await = Some(task);
        Ok(())
    }

    async fn stop_scan(&self) {
        if let Some(task) = self.scan_task.lock().await.take() {
            task.abort();
            debug!("[SCAN] Scan stopped");
        }
    }

    async fn connect(&self, peer: &DiscoveredPeer) -> Result<BluezLink> {
        let address: Address = peer
            .address
            .parse()
            .map_err(|e| anyhow!("invalid Bluetooth address {}: {}", peer.address, e))?;
        let device = self.adapter()?.device(address)?;

        info!("[BLE] Connecting to {}", address);
        device.connect().await?;

        match resolve_characteristics(&device).await {
            Ok(characteristics) => Ok(BluezLink {
                address: peer.address.clone(),
                device,
                characteristics,
                notify_tasks: Mutex::new(Vec::new()),
            }),
            Err(e) => {
                if let Err(disconnect_err) = device.disconnect().await {
                    warn!("[BLE] Disconnect after failed setup: {}", disconnect_err);
                }
                Err(e)
            }
        }
    }
}

struct MinidroneCharacteristics {
    piloting: Characteristic,
    command: Characteristic,
    flight_status: Characteristic,
    battery: Characteristic,
}

async fn resolve_characteristics(device: &Device) -> Result<MinidroneCharacteristics> {
    let mut waited = Duration::ZERO;
    while !device.is_services_resolved().await? {
        if waited >= SERVICES_RESOLVE_TIMEOUT {
            bail!("GATT services not resolved within {:?}", SERVICES_RESOLVE_TIMEOUT);
        }
        tokio::time::sleep(SERVICES_POLL_INTERVAL).await;
        waited += SERVICES_POLL_INTERVAL;
    }

    let mut found: HashMap<Uuid, Characteristic> = HashMap::new();
    for service in device.services().await? {
        let service_uuid = service.uuid().await?;
        if service_uuid != COMMAND_SERVICE_UUID && service_uuid != NOTIFICATION_SERVICE_UUID {
            continue;
        }
        for characteristic in service.characteristics().await? {
            found.insert(characteristic.uuid().await?, characteristic);
        }
    }

    let mut take = |uuid: Uuid| {
        found
            .remove(&uuid)
            .ok_or_else(|| anyhow!("device does not expose minidrone characteristic {}", uuid))
    };

    Ok(MinidroneCharacteristics {
        piloting: take(PILOTING_CHAR_UUID)?,
        command: take(COMMAND_CHAR_UUID)?,
        flight_status: take(FLIGHT_STATUS_CHAR_UUID)?,
        battery: take(BATTERY_CHAR_UUID)?,
    })
}

/// GATT connection to a minidrone
pub struct BluezLink {
    address: String,
    device: Device,
    characteristics: MinidroneCharacteristics,
    notify_tasks: Mutex<Vec<JoinHandle<()>>>,
}

#[async_trait]
impl Link for BluezLink {
    fn address(&self) -> &str {
        &self.address
    }

    async fn write(&self, channel: Channel, frame: Bytes) -> Result<()> {
        let (characteristic, op_type) = match channel {
            // PCMD is sent without response so piloting never waits on the drone
            Channel::Piloting => (&self.characteristics.piloting, WriteOp::Command),
            Channel::Command => (&self.characteristics.command, WriteOp::Request),
            other => bail!("{} is not an outbound channel", other),
        };

        let request = CharacteristicWriteRequest {
            op_type,
            ..Default::default()
        };
        characteristic
            .write_ext(&frame, &request)
            .await
            .with_context(|| format!("write to {} channel", channel))
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<(Channel, Bytes)>> {
        let (tx, rx) = mpsc::channel(64);
        let mut tasks = self.notify_tasks.lock().await;

        let inbound = [
            (Channel::FlightStatus, self.characteristics.flight_status.clone()),
            (Channel::Battery, self.characteristics.battery.clone()),
        ];

        for (channel, characteristic) in inbound {
            let (ready_tx, ready_rx) = oneshot::channel();
            let tx = tx.clone();

            tasks.push(tokio::spawn(async move {
                let values = match characteristic.notify().await {
                    Ok(values) => {
                        let _ = ready_tx.send(Ok(()));
                        values
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                tokio::pin!(values);

                while let Some(value) = values.next().await {
                    if tx.send((channel, Bytes::from(value))).await.is_err() {
                        break;
                    }
                }
                debug!("[BLE] {} notifications ended", channel);
            }));

            ready_rx
                .await
                .map_err(|_| anyhow!("{} subscription ended before it started", channel))?
                .with_context(|| format!("subscribe to {} notifications", channel))?;
        }

        Ok(rx)
    }

    async fn disconnect(&self) -> Result<()> {
        for task in self.notify_tasks.lock().await.drain(..) {
            task.abort();
        }
        self.device.disconnect().await?;
        info!("[BLE] Disconnected from {}", self.address);
        Ok(())
    }
}

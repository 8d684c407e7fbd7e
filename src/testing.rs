//! Test doubles for the radio, the drone link and the terminal

use crate::input::{InputCloser, InputEvent, InputSource};
use crate::transport::traits::{DiscoveredPeer, Link, Radio, ScanControl, ScanHandler};
use anyhow::{bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use minidrone_shared::{ArCommand, Channel, Frame};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub fn peer(address: &str) -> DiscoveredPeer {
    DiscoveredPeer {
        address: address.to_string(),
        rssi: Some(-60),
        name: Some("Mambo_612345".to_string()),
    }
}

/// Something that happened on a recorded link
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Subscribed,
    Sent(ArCommand),
    Disconnected,
}

/// Shared record of everything written to the links of one radio
#[derive(Default)]
pub struct LinkLog {
    actions: Mutex<Vec<Action>>,
    writes: Mutex<Vec<(Channel, Bytes)>>,
    notifier: Mutex<Option<mpsc::Sender<(Channel, Bytes)>>>,
}

impl LinkLog {
    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<(Channel, Bytes)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<ArCommand> {
        self.actions()
            .into_iter()
            .filter_map(|action| match action {
                Action::Sent(command) => Some(command),
                _ => None,
            })
            .collect()
    }

    pub fn subscribes(&self) -> usize {
        self.count(|action| *action == Action::Subscribed)
    }

    pub fn disconnects(&self) -> usize {
        self.count(|action| *action == Action::Disconnected)
    }

    /// Push a raw notification into the current subscription
    pub async fn notify(&self, channel: Channel, data: &[u8]) {
        let notifier = self.notifier.lock().unwrap().clone();
        notifier
            .expect("nobody subscribed")
            .send((channel, Bytes::copy_from_slice(data)))
            .await
            .expect("subscription closed");
    }

    fn count(&self, predicate: impl Fn(&Action) -> bool) -> usize {
        self.actions.lock().unwrap().iter().filter(|a| predicate(a)).count()
    }

    fn record(&self, action: Action) {
        self.actions.lock().unwrap().push(action);
    }
}

/// Link that records writes instead of sending them
pub struct RecordingLink {
    address: String,
    log: Arc<LinkLog>,
    fail_subscribe: bool,
    fail_writes: bool,
}

impl RecordingLink {
    pub fn new(address: &str, log: Arc<LinkLog>) -> Self {
        Self {
            address: address.to_string(),
            log,
            fail_subscribe: false,
            fail_writes: false,
        }
    }

    pub fn fail_subscribe(mut self) -> Self {
        self.fail_subscribe = true;
        self
    }

    pub fn fail_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }
}

#[async_trait]
impl Link for RecordingLink {
    fn address(&self) -> &str {
        &self.address
    }

    async fn write(&self, channel: Channel, frame: Bytes) -> Result<()> {
        if self.fail_writes {
            bail!("write rejected");
        }
        let frame_decoded = Frame::decode(&frame).expect("well-formed frame");
        let command = ArCommand::from_frame(&frame_decoded)
            .expect("valid arguments")
            .expect("known command");
        self.log.writes.lock().unwrap().push((channel, frame));
        self.log.record(Action::Sent(command));
        Ok(())
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<(Channel, Bytes)>> {
        if self.fail_subscribe {
            bail!("notifications unavailable");
        }
        let (tx, rx) = mpsc::channel(16);
        *self.log.notifier.lock().unwrap() = Some(tx);
        self.log.record(Action::Subscribed);
        Ok(rx)
    }

    async fn disconnect(&self) -> Result<()> {
        self.log.record(Action::Disconnected);
        Ok(())
    }
}

/// Radio that replays a fixed list of advertisements
#[derive(Clone)]
pub struct FakeRadio {
    adverts: Arc<Vec<DiscoveredPeer>>,
    keep_scanning: bool,
    fail_enable: bool,
    fail_scan: bool,
    fail_subscribe: bool,
    connect_failures: Arc<AtomicUsize>,
    delivered: Arc<AtomicUsize>,
    connect_calls: Arc<AtomicUsize>,
    scan_stopped: Arc<AtomicBool>,
    parked: Arc<Mutex<Option<ScanHandler>>>,
    log: Arc<LinkLog>,
}

impl FakeRadio {
    pub fn new(adverts: Vec<DiscoveredPeer>) -> Self {
        Self {
            adverts: Arc::new(adverts),
            keep_scanning: false,
            fail_enable: false,
            fail_scan: false,
            fail_subscribe: false,
            connect_failures: Arc::new(AtomicUsize::new(0)),
            delivered: Arc::new(AtomicUsize::new(0)),
            connect_calls: Arc::new(AtomicUsize::new(0)),
            scan_stopped: Arc::new(AtomicBool::new(false)),
            parked: Arc::new(Mutex::new(None)),
            log: Arc::new(LinkLog::default()),
        }
    }

    /// Keep the scan running after the adverts run out
    pub fn keep_scanning(mut self) -> Self {
        self.keep_scanning = true;
        self
    }

    pub fn fail_enable(mut self) -> Self {
        self.fail_enable = true;
        self
    }

    pub fn fail_scan(mut self) -> Self {
        self.fail_scan = true;
        self
    }

    /// Hand out links whose notification subscription fails
    pub fn fail_subscribe(mut self) -> Self {
        self.fail_subscribe = true;
        self
    }

    /// Fail the next `attempts` connects
    pub fn fail_connects(self, attempts: usize) -> Self {
        self.connect_failures.store(attempts, Ordering::SeqCst);
        self
    }

    pub fn link_log(&self) -> Arc<LinkLog> {
        self.log.clone()
    }

    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn scan_stopped(&self) -> bool {
        self.scan_stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Radio for FakeRadio {
    type Link = RecordingLink;

    async fn enable(&self) -> Result<()> {
        if self.fail_enable {
            bail!("no adapter");
        }
        Ok(())
    }

    async fn scan(&self, mut handler: ScanHandler) -> Result<()> {
        if self.fail_scan {
            bail!("scan busy");
        }
        for advert in self.adverts.iter() {
            self.delivered.fetch_add(1, Ordering::SeqCst);
            if handler(advert) == ScanControl::Stop {
                return Ok(());
            }
        }
        if self.keep_scanning {
            *self.parked.lock().unwrap() = Some(handler);
        }
        Ok(())
    }

    async fn stop_scan(&self) {
        self.scan_stopped.store(true, Ordering::SeqCst);
        self.parked.lock().unwrap().take();
    }

    async fn connect(&self, peer: &DiscoveredPeer) -> Result<RecordingLink> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .connect_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            bail!("connection refused by {}", peer.address);
        }
        let link = RecordingLink::new(&peer.address, self.log.clone());
        if self.fail_subscribe {
            return Ok(link.fail_subscribe());
        }
        Ok(link)
    }
}

/// Input source that plays back events, then waits forever
pub struct ScriptedInput {
    events: VecDeque<InputEvent>,
    closes: Arc<AtomicUsize>,
}

impl ScriptedInput {
    pub fn new(events: Vec<InputEvent>) -> Self {
        Self {
            events: events.into(),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn close_count(&self) -> Arc<AtomicUsize> {
        self.closes.clone()
    }
}

#[async_trait]
impl InputSource for ScriptedInput {
    async fn next_event(&mut self) -> InputEvent {
        match self.events.pop_front() {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }

    fn closer(&self) -> InputCloser {
        let closes = self.closes.clone();
        Arc::new(move || {
            closes.fetch_add(1, Ordering::SeqCst);
        })
    }
}

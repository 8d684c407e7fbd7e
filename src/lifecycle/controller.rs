//! Lifecycle controller: locate, connect, fly, and clean up exactly once

use crate::config::{PilotConfig, Variant};
use crate::error::PilotError;
use crate::input::{run_input_loop, InputCloser, InputSource, LoopExit};
use crate::lifecycle::wait_grounded;
use crate::minidrone::log_piloting_state;
use crate::session::Session;
use crate::transport::{DiscoveredPeer, LocateOutcome, PeerLocator, Radio, TargetAddress};
use minidrone_shared::{LifecycleEvent, LifecycleMachine, LifecycleState, TransitionResult};
use std::fmt;
use std::sync::{Mutex, MutexGuard, OnceLock};
use tokio::sync::{watch, OnceCell, RwLock};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The operator pressed the exit key
    ExitKey,
    /// The input source failed
    InputError,
    /// OS signal or Ctrl+C key
    Interrupt,
    /// The drone was not found in time
    ScanTimeout,
    /// A fatal setup error
    SetupFailed,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::ExitKey => write!(f, "exit key"),
            ExitReason::InputError => write!(f, "input error"),
            ExitReason::Interrupt => write!(f, "interrupt"),
            ExitReason::ScanTimeout => write!(f, "scan timeout"),
            ExitReason::SetupFailed => write!(f, "setup failure"),
        }
    }
}

/// Owns the radio, the session and the cleanup latch for one run.
///
/// [`run`](Self::run) drives the foreground path. [`shutdown`](Self::shutdown)
/// may be called from any task at any time; the land, settle, halt and
/// disconnect sequence runs once no matter how many callers race.
pub struct LifecycleController<R: Radio> {
    target: TargetAddress,
    config: PilotConfig,
    radio: R,
    fsm: RwLock<LifecycleMachine>,
    session: OnceCell<Session<R::Link>>,
    cleanup: OnceCell<()>,
    shutdown_reason: OnceLock<ExitReason>,
    grounded: watch::Sender<bool>,
    input_closer: Mutex<Option<InputCloser>>,
}

impl<R: Radio> LifecycleController<R> {
    pub fn new(radio: R, target: TargetAddress, config: PilotConfig) -> Self {
        let (grounded, _) = watch::channel(false);
        Self {
            target,
            config,
            radio,
            fsm: RwLock::new(LifecycleMachine::new()),
            session: OnceCell::new(),
            cleanup: OnceCell::new(),
            shutdown_reason: OnceLock::new(),
            grounded,
            input_closer: Mutex::new(None),
        }
    }

    pub async fn state(&self) -> LifecycleState {
        self.fsm.read().await.state()
    }

    /// Cause of the transition to Failed, if any
    pub async fn failure(&self) -> Option<String> {
        self.fsm.read().await.failure().map(str::to_owned)
    }

    pub fn session(&self) -> Option<&Session<R::Link>> {
        self.session.get()
    }

    /// Run to completion. Cleanup has always finished when this returns.
    ///
    /// `open_input` is only called by the keyboard variant, once the control
    /// channel is up.
    pub async fn run<S, F>(&self, open_input: F) -> Result<ExitReason, PilotError>
    where
        S: InputSource,
        F: FnOnce() -> anyhow::Result<S>,
    {
        let result = self.fly(open_input).await;

        let reason = match &result {
            Ok(reason) => *reason,
            Err(e) => {
                error!("[LIFECYCLE] {}", e);
                let transition = self.fsm.write().await.process_event(LifecycleEvent::Fatal {
                    reason: e.to_string(),
                });
                log_transition(&transition);
                ExitReason::SetupFailed
            }
        };

        self.shutdown(reason).await;
        result
    }

    /// Ground the drone and release everything. Runs once; later callers
    /// wait for the first one to finish.
    pub async fn shutdown(&self, reason: ExitReason) {
        let _ = self.shutdown_reason.set(reason);
        self.cleanup.get_or_init(|| self.clean_up(reason)).await;
    }

    async fn fly<S, F>(&self, open_input: F) -> Result<ExitReason, PilotError>
    where
        S: InputSource,
        F: FnOnce() -> anyhow::Result<S>,
    {
        let mut grounded = self.grounded.subscribe();

        if !self.advance(LifecycleEvent::ScanStarted).await {
            return Ok(self.aborted());
        }

        let locator = PeerLocator::new(&self.radio, self.config.scan_timeout);
        let outcome = tokio::select! {
            biased;
            _ = wait_grounded(&mut grounded) => return Ok(self.aborted()),
            outcome = locator.locate(&self.target) => outcome?,
        };

        let peer = match outcome {
            LocateOutcome::Found(peer) => peer,
            LocateOutcome::TimedOut => {
                self.advance(LifecycleEvent::ScanTimedOut).await;
                return Ok(ExitReason::ScanTimeout);
            }
        };

        if !self.advance(LifecycleEvent::PeerLocated).await {
            return Ok(self.aborted());
        }

        let Some(link) = self.connect(&peer, &mut grounded).await? else {
            return Ok(self.aborted());
        };
        info!("Connected to {}", peer.address);

        let session = self
            .session
            .get_or_init(|| async move { Session::new(link) })
            .await;

        if !self.advance(LifecycleEvent::Connected).await {
            // Cleanup already ran or is running without this link
            let _ = session.close().await;
            return Ok(self.aborted());
        }

        session.on_piloting_state_change(log_piloting_state).await;
        if let Err(e) = session.start_control_channel().await {
            warn!("[PILOT] Failed to start drone: {:#}", e);
        }

        match self.config.variant {
            Variant::Keyboard => self.fly_keyboard(session, open_input, &mut grounded).await,
            Variant::Monitor => self.monitor(&mut grounded).await,
        }
    }

    /// One attempt in keyboard mode; retries on the interval in monitor mode.
    /// `None` means cleanup started before a link came up.
    async fn connect(
        &self,
        peer: &DiscoveredPeer,
        grounded: &mut watch::Receiver<bool>,
    ) -> Result<Option<R::Link>, PilotError> {
        loop {
            let attempt = tokio::select! {
                biased;
                _ = wait_grounded(grounded) => return Ok(None),
                attempt = self.radio.connect(peer) => attempt,
            };

            let cause = match attempt {
                Ok(link) => return Ok(Some(link)),
                Err(cause) => cause,
            };

            if self.config.variant == Variant::Keyboard {
                return Err(PilotError::Connect {
                    address: peer.address.clone(),
                    cause,
                });
            }

            error!("Failed to connect to device {}: {:#}", peer.address, cause);
            tokio::select! {
                biased;
                _ = wait_grounded(grounded) => return Ok(None),
                _ = sleep(self.config.retry_interval) => {}
            }
        }
    }

    async fn fly_keyboard<S, F>(
        &self,
        session: &Session<R::Link>,
        open_input: F,
        grounded: &mut watch::Receiver<bool>,
    ) -> Result<ExitReason, PilotError>
    where
        S: InputSource,
        F: FnOnce() -> anyhow::Result<S>,
    {
        info!("Initializing terminal...");
        let mut input = open_input().map_err(PilotError::InitTerminal)?;
        self.register_input(input.closer());

        info!("Taking off in {} seconds...", self.config.takeoff_delay.as_secs());
        tokio::select! {
            biased;
            _ = wait_grounded(grounded) => return Ok(self.aborted()),
            _ = sleep(self.config.takeoff_delay) => {}
        }

        match session.pilot().await {
            Some(pilot) => {
                if let Err(e) = pilot.take_off().await {
                    warn!("[PILOT] Takeoff failed: {:#}", e);
                }
            }
            None => return Ok(self.aborted()),
        }

        if !self.advance(LifecycleEvent::SessionReady).await {
            return Ok(self.aborted());
        }

        let exit = run_input_loop(&mut input, session, self.config.command_interval, grounded).await;
        Ok(match exit {
            LoopExit::ExitRequested => ExitReason::ExitKey,
            LoopExit::Interrupted => ExitReason::Interrupt,
            LoopExit::InputFailed(_) => ExitReason::InputError,
            LoopExit::Grounded => self.aborted(),
        })
    }

    async fn monitor(&self, grounded: &mut watch::Receiver<bool>) -> Result<ExitReason, PilotError> {
        if !self.advance(LifecycleEvent::SessionReady).await {
            return Ok(self.aborted());
        }

        info!("[LIFECYCLE] Monitoring {}. Press Ctrl+C to land and exit.", self.target);
        wait_grounded(grounded).await;
        Ok(self.aborted())
    }

    async fn clean_up(&self, reason: ExitReason) {
        info!("Cleaning up ({})...", reason);
        self.grounded.send_replace(true);

        {
            let mut fsm = self.fsm.write().await;
            if !fsm.state().is_terminal() {
                log_transition(&fsm.process_event(LifecycleEvent::ShutdownRequested));
            }
        }

        self.radio.stop_scan().await;

        if let Some(session) = self.session.get() {
            session.ground().await;
            if let Err(e) = session.land().await {
                warn!("[PILOT] Land failed: {:#}", e);
            }
            sleep(self.config.settle_delay).await;
            if let Err(e) = session.halt().await {
                warn!("[PILOT] Halt failed: {:#}", e);
            }
            // Failures are logged by the session
            let _ = session.close().await;

            let telemetry = session.telemetry().get_telemetry().await;
            if let Some(state) = telemetry.flying_state {
                info!("[PILOT] Last flying state: {}", state);
            }
            if let Some(battery) = telemetry.battery_percent {
                info!("[PILOT] Last reported battery: {}%", battery);
            }
        }

        let closer = self.closer_slot().take();
        if let Some(close_input) = closer {
            close_input();
        }

        let mut fsm = self.fsm.write().await;
        if fsm.state() == LifecycleState::Landing {
            log_transition(&fsm.process_event(LifecycleEvent::Settled));
        }
        info!("[LIFECYCLE] Shutdown complete");
    }

    /// Keep the closer for cleanup, or release the input right away if
    /// cleanup has already begun.
    fn register_input(&self, closer: InputCloser) {
        let release_now = {
            let mut slot = self.closer_slot();
            if *self.grounded.borrow() {
                true
            } else {
                *slot = Some(closer.clone());
                false
            }
        };
        if release_now {
            closer();
        }
    }

    fn closer_slot(&self) -> MutexGuard<'_, Option<InputCloser>> {
        match self.input_closer.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    async fn advance(&self, event: LifecycleEvent) -> bool {
        let result = self.fsm.write().await.process_event(event);
        log_transition(&result);
        result.is_success()
    }

    fn aborted(&self) -> ExitReason {
        self.shutdown_reason
            .get()
            .copied()
            .unwrap_or(ExitReason::Interrupt)
    }
}

fn log_transition(result: &TransitionResult) {
    match result {
        TransitionResult::Success(state) => info!("[LIFECYCLE] -> {}", state),
        TransitionResult::Invalid { from, event } => {
            debug!("[LIFECYCLE] Ignoring {:?} in {}", event, from)
        }
    }
}

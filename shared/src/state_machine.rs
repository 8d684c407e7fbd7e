//! Pilot Lifecycle State Machine
//!
//! Defines the valid transitions of a piloting session, from startup to the
//! single cleanup that lands and releases the drone.

use std::fmt;

/// Lifecycle states of the pilot process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Scanning,
    Connecting,
    SessionStarting,
    Flying,
    Landing,
    Closed,
    Failed,
}

impl LifecycleState {
    /// Whether no further transitions are possible
    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleState::Closed | LifecycleState::Failed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Scanning => "scanning",
            LifecycleState::Connecting => "connecting",
            LifecycleState::SessionStarting => "session-starting",
            LifecycleState::Flying => "flying",
            LifecycleState::Landing => "landing",
            LifecycleState::Closed => "closed",
            LifecycleState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Events that can trigger lifecycle transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Target identifier validated and scanning began
    ScanStarted,
    /// The target peer was found
    PeerLocated,
    /// Discovery ran out of time without a match
    ScanTimedOut,
    /// The link to the peer is up
    Connected,
    /// Control channel started (and automatic takeoff issued, if any)
    SessionReady,
    /// Exit symbol, input failure or OS interrupt
    ShutdownRequested,
    /// Land, settle, halt and disconnect have completed
    Settled,
    /// Unrecoverable setup error
    Fatal { reason: String },
}

/// Result of a transition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition was valid and the state changed
    Success(LifecycleState),
    /// Transition was invalid from the current state
    Invalid {
        from: LifecycleState,
        event: LifecycleEvent,
    },
}

impl TransitionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, TransitionResult::Success(_))
    }
}

/// The lifecycle state machine
#[derive(Debug)]
pub struct LifecycleMachine {
    current_state: LifecycleState,
    failure: Option<String>,
}

impl Default for LifecycleMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleMachine {
    /// Create a new machine in Idle state
    pub fn new() -> Self {
        Self {
            current_state: LifecycleState::Idle,
            failure: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> LifecycleState {
        self.current_state
    }

    /// Cause recorded by the transition to Failed
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: LifecycleEvent) -> TransitionResult {
        if let LifecycleEvent::Fatal { reason } = &event {
            if self.current_state.is_terminal() {
                return TransitionResult::Invalid {
                    from: self.current_state,
                    event,
                };
            }
            self.failure = Some(reason.clone());
            self.current_state = LifecycleState::Failed;
            return TransitionResult::Success(LifecycleState::Failed);
        }

        match self.get_next_state(&event) {
            Some(state) => {
                self.current_state = state;
                TransitionResult::Success(state)
            }
            None => TransitionResult::Invalid {
                from: self.current_state,
                event,
            },
        }
    }

    /// Get the next state for a given event, if the transition is valid
    fn get_next_state(&self, event: &LifecycleEvent) -> Option<LifecycleState> {
        use LifecycleEvent::*;
        use LifecycleState::*;

        match (self.current_state, event) {
            (Idle, ScanStarted) => Some(Scanning),

            (Scanning, PeerLocated) => Some(Connecting),
            (Scanning, ScanTimedOut) => Some(Closed),

            (Connecting, Connected) => Some(SessionStarting),

            (SessionStarting, SessionReady) => Some(Flying),

            // Nothing to land before a session exists
            (Idle | Scanning | Connecting, ShutdownRequested) => Some(Closed),
            (SessionStarting | Flying, ShutdownRequested) => Some(Landing),

            (Landing, Settled) => Some(Closed),

            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fatal(reason: &str) -> LifecycleEvent {
        LifecycleEvent::Fatal {
            reason: reason.into(),
        }
    }

    #[test]
    fn test_initial_state() {
        let fsm = LifecycleMachine::new();
        assert_eq!(fsm.state(), LifecycleState::Idle);
        assert!(fsm.failure().is_none());
    }

    #[test]
    fn test_normal_flight_flow() {
        let mut fsm = LifecycleMachine::new();

        let steps = [
            (LifecycleEvent::ScanStarted, LifecycleState::Scanning),
            (LifecycleEvent::PeerLocated, LifecycleState::Connecting),
            (LifecycleEvent::Connected, LifecycleState::SessionStarting),
            (LifecycleEvent::SessionReady, LifecycleState::Flying),
            (LifecycleEvent::ShutdownRequested, LifecycleState::Landing),
            (LifecycleEvent::Settled, LifecycleState::Closed),
        ];

        for (event, expected) in steps {
            assert_eq!(fsm.process_event(event), TransitionResult::Success(expected));
        }
        assert!(fsm.state().is_terminal());
    }

    #[test]
    fn test_scan_timeout_closes_gracefully() {
        let mut fsm = LifecycleMachine::new();
        fsm.process_event(LifecycleEvent::ScanStarted);

        let result = fsm.process_event(LifecycleEvent::ScanTimedOut);
        assert_eq!(result, TransitionResult::Success(LifecycleState::Closed));
        assert!(fsm.failure().is_none());
    }

    #[test]
    fn test_shutdown_before_session_skips_landing() {
        let mut fsm = LifecycleMachine::new();
        fsm.process_event(LifecycleEvent::ScanStarted);
        fsm.process_event(LifecycleEvent::PeerLocated);

        let result = fsm.process_event(LifecycleEvent::ShutdownRequested);
        assert_eq!(result, TransitionResult::Success(LifecycleState::Closed));
    }

    #[test]
    fn test_startup_cannot_resume_after_shutdown() {
        let mut fsm = LifecycleMachine::new();
        fsm.process_event(LifecycleEvent::ScanStarted);
        fsm.process_event(LifecycleEvent::PeerLocated);
        fsm.process_event(LifecycleEvent::Connected);
        fsm.process_event(LifecycleEvent::ShutdownRequested);
        assert_eq!(fsm.state(), LifecycleState::Landing);

        let result = fsm.process_event(LifecycleEvent::SessionReady);
        assert!(matches!(
            result,
            TransitionResult::Invalid {
                from: LifecycleState::Landing,
                ..
            }
        ));
        assert_eq!(fsm.state(), LifecycleState::Landing);
    }

    #[test]
    fn test_second_shutdown_is_invalid() {
        let mut fsm = LifecycleMachine::new();
        fsm.process_event(LifecycleEvent::ScanStarted);
        fsm.process_event(LifecycleEvent::PeerLocated);
        fsm.process_event(LifecycleEvent::Connected);
        fsm.process_event(LifecycleEvent::SessionReady);

        assert!(fsm.process_event(LifecycleEvent::ShutdownRequested).is_success());
        assert!(!fsm.process_event(LifecycleEvent::ShutdownRequested).is_success());
    }

    #[test]
    fn test_fatal_from_any_live_state() {
        let mut fsm = LifecycleMachine::new();
        fsm.process_event(LifecycleEvent::ScanStarted);
        fsm.process_event(LifecycleEvent::PeerLocated);

        let result = fsm.process_event(fatal("connect to device: refused"));
        assert_eq!(result, TransitionResult::Success(LifecycleState::Failed));
        assert_eq!(fsm.failure(), Some("connect to device: refused"));
    }

    #[test]
    fn test_failed_is_final() {
        let mut fsm = LifecycleMachine::new();
        fsm.process_event(fatal("enable BLE interface"));

        assert!(!fsm.process_event(LifecycleEvent::ShutdownRequested).is_success());
        assert!(!fsm.process_event(fatal("again")).is_success());
        assert_eq!(fsm.failure(), Some("enable BLE interface"));
    }

    #[test]
    fn test_invalid_transition() {
        let mut fsm = LifecycleMachine::new();

        // Can't connect before scanning
        let result = fsm.process_event(LifecycleEvent::Connected);
        assert!(matches!(result, TransitionResult::Invalid { .. }));
        assert_eq!(fsm.state(), LifecycleState::Idle);
    }
}

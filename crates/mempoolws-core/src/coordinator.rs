//! Reconnection Coordinator — restores server-side state after a reconnect.
//!
//! Owns the [`ConnectionState`]. The first frame processed while offline
//! flips the state back to open and yields the Interest Set's replay intents,
//! exactly once; later frames see the open state and yield nothing.
//! Callers serialise access (the session holds its lock around every call),
//! which makes the check-and-clear atomic.

use crate::interest::InterestSet;
use crate::intent::Intent;
use crate::state::ConnectionState;

/// What processing a frame did to the connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resume {
    /// Already open; nothing to do.
    Steady,
    /// First frame on the first connection.
    Opened,
    /// First frame after a failure; these intents must be sent before any
    /// further frame processing.
    Restored(Vec<Intent>),
}

#[derive(Debug, Default)]
pub struct ReconnectionCoordinator {
    state: ConnectionState,
}

impl ReconnectionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Record that a frame arrived.
    pub fn on_frame(&mut self, interests: &InterestSet) -> Resume {
        match self.state {
            ConnectionState::Open => Resume::Steady,
            ConnectionState::Connecting => {
                self.state = ConnectionState::Open;
                Resume::Opened
            }
            ConnectionState::Offline => {
                self.state = ConnectionState::Open;
                Resume::Restored(interests.replay_intents())
            }
        }
    }

    /// Record a transport failure. Returns the state before the failure.
    pub fn on_transport_error(&mut self) -> ConnectionState {
        std::mem::replace(&mut self.state, ConnectionState::Offline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interests() -> InterestSet {
        let mut set = InterestSet::new();
        set.set_want(vec!["blocks".into()]);
        set.track_transaction("abc");
        set
    }

    #[test]
    fn first_frame_opens_without_replay() {
        let mut coordinator = ReconnectionCoordinator::new();
        assert_eq!(coordinator.on_frame(&interests()), Resume::Opened);
        assert_eq!(coordinator.state(), ConnectionState::Open);
        assert_eq!(coordinator.on_frame(&interests()), Resume::Steady);
    }

    #[test]
    fn replays_exactly_once_after_failure() {
        let mut coordinator = ReconnectionCoordinator::new();
        coordinator.on_frame(&interests());
        assert_eq!(coordinator.on_transport_error(), ConnectionState::Open);
        assert_eq!(coordinator.state(), ConnectionState::Offline);

        match coordinator.on_frame(&interests()) {
            Resume::Restored(intents) => assert_eq!(intents, interests().replay_intents()),
            other => panic!("expected replay, got {other:?}"),
        }
        assert_eq!(coordinator.on_frame(&interests()), Resume::Steady);
    }

    #[test]
    fn connect_failure_before_first_frame_still_replays() {
        let mut coordinator = ReconnectionCoordinator::new();
        assert_eq!(coordinator.on_transport_error(), ConnectionState::Connecting);
        assert!(matches!(coordinator.on_frame(&interests()), Resume::Restored(_)));
    }

    #[test]
    fn repeated_failures_stay_offline() {
        let mut coordinator = ReconnectionCoordinator::new();
        coordinator.on_transport_error();
        assert_eq!(coordinator.on_transport_error(), ConnectionState::Offline);
        assert_eq!(coordinator.state(), ConnectionState::Offline);
    }
}

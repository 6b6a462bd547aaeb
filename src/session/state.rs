use crate::engine::PeerConnectionState;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a publishing session
///
/// `Idle → Negotiating → Publishing → Stopping → Stopped`. A failed publish
/// parks the session in `Failed`, from which only `stop()` proceeds.
/// `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum SessionState {
    Idle = 0,
    Negotiating = 1,
    Publishing = 2,
    Failed = 3,
    Stopping = 4,
    Stopped = 5,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Idle,
            1 => SessionState::Negotiating,
            2 => SessionState::Publishing,
            3 => SessionState::Failed,
            4 => SessionState::Stopping,
            _ => SessionState::Stopped,
        }
    }

    /// Whether `stop()` has work to do from this state
    pub fn can_stop(self) -> bool {
        matches!(
            self,
            SessionState::Negotiating | SessionState::Publishing | SessionState::Failed
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Negotiating => write!(f, "negotiating"),
            SessionState::Publishing => write!(f, "publishing"),
            SessionState::Failed => write!(f, "failed"),
            SessionState::Stopping => write!(f, "stopping"),
            SessionState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Atomic holder for [`SessionState`]; transitions are compare-and-swap
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: SessionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Move `from → to`; fails with the actual state if it was not `from`
    pub(crate) fn transition(
        &self,
        from: SessionState,
        to: SessionState,
    ) -> Result<(), SessionState> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(SessionState::from_u8)
    }
}

/// Connection status reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionStatus {
    /// Normalize an engine state; `Unspecified` carries no information
    pub fn from_engine(state: PeerConnectionState) -> Option<Self> {
        match state {
            PeerConnectionState::Unspecified => None,
            PeerConnectionState::New | PeerConnectionState::Connecting => {
                Some(ConnectionStatus::Connecting)
            }
            PeerConnectionState::Connected => Some(ConnectionStatus::Connected),
            PeerConnectionState::Disconnected => Some(ConnectionStatus::Disconnected),
            PeerConnectionState::Failed => Some(ConnectionStatus::Failed),
            PeerConnectionState::Closed => Some(ConnectionStatus::Closed),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Failed => "failed",
            ConnectionStatus::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events broadcast by a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    StateChanged { from: SessionState, to: SessionState },
}

use super::state::{ConnectionStatus, SessionState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of a publishing session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Session identifier (uuid)
    pub session_id: String,

    /// Lifecycle state at snapshot time
    pub state: SessionState,

    /// Last status reported by the peer connection
    pub connection_status: Option<ConnectionStatus>,

    /// WHIP session resource, once negotiated
    pub location: Option<String>,

    /// When the session was created
    pub created_at: DateTime<Utc>,

    /// When publishing started, if it did
    pub publishing_since: Option<DateTime<Utc>>,

    /// Seconds spent publishing so far
    pub publishing_secs: f64,
}

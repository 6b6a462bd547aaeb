//! Error types for publishing sessions.

use crate::session::SessionState;
use thiserror::Error;

/// Failure to obtain a media stream from the capture layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The requested device id does not exist.
    #[error("Capture device not found: {0}")]
    DeviceNotFound(String),

    /// Neither audio nor video was requested.
    #[error("No media requested: audio and video are both disabled")]
    NothingRequested,

    /// The device refused or failed to deliver a stream.
    #[error("Capture failed: {0}")]
    Acquisition(String),
}

/// Failure reported by the peer-connection engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine rejected an offer, answer or track.
    #[error("Peer connection rejected operation: {0}")]
    Rejected(String),

    /// The peer connection was already closed.
    #[error("Peer connection is closed")]
    Closed,

    /// The engine does not implement the requested operation.
    #[error("Unsupported by peer connection engine: {0}")]
    Unsupported(String),
}

/// Tagged outcome of a failed signaling request.
///
/// Status-based and connectivity-based failures are kept apart so callers can
/// word their reports, but both flow through the same `Result`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The endpoint answered with a non-2xx status.
    #[error("HTTP status {status}")]
    Status { status: u16 },

    /// The request could not complete.
    #[error("Network error: {0}")]
    Network(String),
}

impl TransportError {
    /// HTTP status, if the endpoint answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status } => Some(*status),
            TransportError::Network(_) => None,
        }
    }
}

/// Error returned by [`Session::publish`](crate::Session::publish).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// Stream acquisition failed.
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// The peer-connection engine refused the negotiation.
    #[error(transparent)]
    Negotiation(#[from] EngineError),

    /// Signaling with the ingest endpoint failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The configured ingest URL is not a valid absolute URL.
    #[error("Invalid ingest URL: {0}")]
    InvalidUrl(String),

    /// `publish()` was called outside the `Idle` state.
    #[error("Cannot publish from state {state}")]
    InvalidState { state: SessionState },

    /// `stop()` was called while negotiation was in flight.
    #[error("Publish cancelled by stop")]
    Cancelled,
}

/// Result type for transport calls.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Result type for publishing.
pub type Result<T> = std::result::Result<T, PublishError>;

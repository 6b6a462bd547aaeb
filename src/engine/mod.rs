//! Peer-connection engine seam
//!
//! ICE, DTLS and RTP live in an external engine. The session drives it
//! through these traits:
//! - [`PeerConnectionFactory`] creates one connection per publish
//! - [`PeerConnection`] handles offer/answer, tracks and state changes
//! - [`RtpSender`] exposes per-sender encoding parameters

#[cfg(feature = "webrtc")]
pub mod webrtc_rs;

use crate::capture::{MediaStream, MediaTrack, TrackKind};
use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Offer or answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

/// SDP text tagged with its role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    pub kind: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Raw connection state as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerConnectionState {
    Unspecified,
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// One entry of a sender's encoding list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodingParameters {
    /// Restriction identifier for simulcast layers
    pub rid: Option<String>,
    /// Bitrate cap in bits per second
    pub max_bitrate: Option<u64>,
}

/// Sender parameters (only the fields the publisher touches)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendParameters {
    pub encodings: Vec<EncodingParameters>,
}

/// Observer invoked on every engine connection-state change
pub type StateChangeHandler = Box<dyn Fn(PeerConnectionState) + Send + Sync>;

/// Outbound RTP sender
#[async_trait::async_trait]
pub trait RtpSender: Send + Sync {
    /// Kind of the track currently attached, if any
    async fn track_kind(&self) -> Option<TrackKind>;

    async fn get_parameters(&self) -> SendParameters;

    async fn set_parameters(&self, parameters: SendParameters) -> Result<(), EngineError>;
}

/// A single peer connection
#[async_trait::async_trait]
pub trait PeerConnection: Send + Sync {
    /// Install the connection-state observer, replacing any previous one
    fn on_connection_state_change(&self, handler: StateChangeHandler);

    /// Attach a track of `stream` for sending
    async fn add_track(&self, track: &MediaTrack, stream: &MediaStream)
        -> Result<(), EngineError>;

    async fn create_offer(&self) -> Result<SessionDescription, EngineError>;

    async fn set_local_description(&self, description: SessionDescription)
        -> Result<(), EngineError>;

    /// Local description as the engine would send it
    ///
    /// Engines that gather ICE candidates into the description return it
    /// here; `None` means the description passed to
    /// [`set_local_description`](Self::set_local_description) is final.
    async fn local_description(&self) -> Option<SessionDescription> {
        None
    }

    async fn set_remote_description(&self, description: SessionDescription)
        -> Result<(), EngineError>;

    async fn senders(&self) -> Vec<Arc<dyn RtpSender>>;

    async fn close(&self) -> Result<(), EngineError>;
}

/// Creates peer connections
#[async_trait::async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn create(&self) -> Result<Arc<dyn PeerConnection>, EngineError>;

    /// Engine name for logging
    fn name(&self) -> &str;
}

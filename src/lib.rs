//! WHIP publishing client.
//!
//! A [`Session`] acquires a stream from a [`CaptureBackend`], negotiates it
//! through a [`PeerConnection`] engine, exchanges the offer and answer with a
//! WHIP ingest endpoint, and deletes the remote session on stop.

pub mod capture;
pub mod config;
pub mod engine;
pub mod error;
pub mod negotiation;
pub mod session;
pub mod transport;

pub use capture::{
    CaptureBackend, CaptureConstraints, DeviceInfo, MediaStream, MediaTrack, StaticCapture,
    TrackKind, VideoSink,
};
pub use config::Config;
pub use engine::{
    PeerConnection, PeerConnectionFactory, PeerConnectionState, RtpSender, SessionDescription,
};
pub use error::{CaptureError, EngineError, PublishError, TransportError};
pub use session::{
    Callbacks, ConnectionStatus, LogLevel, Session, SessionEvent, SessionState, SessionStats,
    Settings,
};
pub use transport::{WhipAnswer, WhipTransport};

//! Publishing session management
//!
//! This module provides the `Session` controller that manages:
//! - Stream acquisition through the capture backend
//! - Peer connection lifecycle and state observation
//! - WHIP offer/answer exchange and session teardown
//! - Lifecycle state, events and statistics

mod session;
mod settings;
mod state;
mod stats;

pub use session::{Session, CLOSE_GRACE_PERIOD};
pub use settings::{
    parse_resolution, Callbacks, LogLevel, Settings, SettingsHook, StateHook, TextHook,
};
pub use state::{ConnectionStatus, SessionEvent, SessionState};
pub use stats::SessionStats;

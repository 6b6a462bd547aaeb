//! Capture device layer
//!
//! The session never talks to cameras or microphones directly. It asks a
//! [`CaptureBackend`] for a [`MediaStream`] and hands the stream's tracks to
//! the peer-connection engine.

pub mod backend;
pub mod fixed;

pub use backend::{
    label_video_inputs, CaptureBackend, CaptureConstraints, DeviceInfo, MediaStream, MediaTrack,
    TrackKind, VideoSink,
};
pub use fixed::{StaticCapture, STATIC_DEVICE_ID};

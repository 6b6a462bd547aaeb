use crate::error::CaptureError;
use serde::{Deserialize, Serialize};

/// Kind of a media track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

/// Handle to a single captured track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTrack {
    /// Track identifier, unique within the stream
    pub id: String,
    /// Audio or video
    pub kind: TrackKind,
    /// Human readable source label
    pub label: String,
}

/// A captured stream: one handle per track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaStream {
    /// Stream identifier (used as the msid in the offer)
    pub id: String,
    /// Tracks in attach order
    pub tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tracks: Vec::new(),
        }
    }

    pub fn with_track(mut self, track: MediaTrack) -> Self {
        self.tracks.push(track);
        self
    }

    /// First track of the given kind
    pub fn track(&self, kind: TrackKind) -> Option<&MediaTrack> {
        self.tracks.iter().find(|t| t.kind == kind)
    }
}

/// Constraints handed to the capture layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConstraints {
    /// Capture audio
    pub audio: bool,
    /// Capture video
    pub video: bool,
    /// Requested frame width in pixels
    pub width: u32,
    /// Requested frame height in pixels
    pub height: u32,
    /// Exact video device to use, if selected
    pub device_id: Option<String>,
}

/// A selectable video input device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_id: String,
    pub label: String,
}

/// Give unnamed video inputs a readable label (`Camera 1`, `Camera 2`, ...)
pub fn label_video_inputs(devices: Vec<DeviceInfo>) -> Vec<DeviceInfo> {
    devices
        .into_iter()
        .enumerate()
        .map(|(i, mut device)| {
            if device.label.trim().is_empty() {
                device.label = format!("Camera {}", i + 1);
            }
            device
        })
        .collect()
}

/// Capture device layer
///
/// Implementations own the actual devices; the session only sees
/// [`MediaStream`] handles.
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Acquire a stream matching the constraints
    async fn acquire(&self, constraints: &CaptureConstraints)
        -> Result<MediaStream, CaptureError>;

    /// List available video input devices
    async fn video_inputs(&self) -> Result<Vec<DeviceInfo>, CaptureError>;

    /// Give back a stream previously returned by [`acquire`](Self::acquire)
    async fn release(&self, _stream: &MediaStream) {}

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Local preview of the published stream
pub trait VideoSink: Send + Sync {
    fn attach(&self, stream: &MediaStream);

    fn detach(&self);
}

impl std::fmt::Debug for dyn VideoSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VideoSink")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_video_inputs() {
        let devices = vec![
            DeviceInfo {
                device_id: "a".to_string(),
                label: "FaceTime HD".to_string(),
            },
            DeviceInfo {
                device_id: "b".to_string(),
                label: String::new(),
            },
        ];

        let labelled = label_video_inputs(devices);
        assert_eq!(labelled[0].label, "FaceTime HD");
        assert_eq!(labelled[1].label, "Camera 2");
    }

    #[test]
    fn test_stream_track_lookup() {
        let stream = MediaStream::new("s").with_track(MediaTrack {
            id: "v".to_string(),
            kind: TrackKind::Video,
            label: "cam".to_string(),
        });

        assert_eq!(stream.track(TrackKind::Video).map(|t| t.id.as_str()), Some("v"));
        assert!(stream.track(TrackKind::Audio).is_none());
    }
}

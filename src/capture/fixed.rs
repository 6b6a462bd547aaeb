use super::backend::{
    CaptureBackend, CaptureConstraints, DeviceInfo, MediaStream, MediaTrack, TrackKind,
};
use crate::error::CaptureError;
use tracing::info;

/// Device id of the single input exposed by [`StaticCapture`]
pub const STATIC_DEVICE_ID: &str = "static-video-0";

/// Capture backend that hands out track handles without touching a device
///
/// Used when media is produced elsewhere (an encoder writing samples through
/// the engine) or when only the signaling path is exercised.
#[derive(Debug, Default)]
pub struct StaticCapture;

impl StaticCapture {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl CaptureBackend for StaticCapture {
    async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<MediaStream, CaptureError> {
        if !constraints.audio && !constraints.video {
            return Err(CaptureError::NothingRequested);
        }

        if let Some(device_id) = &constraints.device_id {
            if device_id != STATIC_DEVICE_ID {
                return Err(CaptureError::DeviceNotFound(device_id.clone()));
            }
        }

        let stream_id = uuid::Uuid::new_v4().to_string();
        let mut stream = MediaStream::new(stream_id.clone());

        if constraints.audio {
            stream = stream.with_track(MediaTrack {
                id: format!("{}-audio", stream_id),
                kind: TrackKind::Audio,
                label: "static audio".to_string(),
            });
        }

        if constraints.video {
            stream = stream.with_track(MediaTrack {
                id: format!("{}-video", stream_id),
                kind: TrackKind::Video,
                label: format!("static video {}x{}", constraints.width, constraints.height),
            });
        }

        info!(
            "Static capture created stream {} ({} tracks)",
            stream.id,
            stream.tracks.len()
        );

        Ok(stream)
    }

    async fn video_inputs(&self) -> Result<Vec<DeviceInfo>, CaptureError> {
        Ok(vec![DeviceInfo {
            device_id: STATIC_DEVICE_ID.to_string(),
            label: String::new(),
        }])
    }

    fn name(&self) -> &str {
        "static"
    }
}

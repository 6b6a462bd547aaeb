//! Peer-connection engine backed by the `webrtc` crate.

use super::{
    EncodingParameters, PeerConnection, PeerConnectionFactory, PeerConnectionState, RtpSender,
    SdpType, SendParameters, SessionDescription, StateChangeHandler,
};
use crate::capture::{MediaStream, MediaTrack, TrackKind};
use crate::error::EngineError;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tracing::{debug, info};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_H264, MIME_TYPE_OPUS};
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{
    RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType,
};
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCPFeedback;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

/// Payload type registered for Opus
pub const OPUS_PAYLOAD_TYPE: u8 = 111;

/// Payload type registered for H.264
pub const H264_PAYLOAD_TYPE: u8 = 102;

const H264_FMTP: &str = "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f";

fn rejected(e: webrtc::Error) -> EngineError {
    EngineError::Rejected(e.to_string())
}

fn codec_for(kind: TrackKind) -> RTCRtpCodecCapability {
    match kind {
        TrackKind::Audio => RTCRtpCodecCapability {
            mime_type: MIME_TYPE_OPUS.to_owned(),
            clock_rate: 48000,
            channels: 2,
            sdp_fmtp_line: "minptime=10;useinbandfec=1".to_owned(),
            ..Default::default()
        },
        TrackKind::Video => RTCRtpCodecCapability {
            mime_type: MIME_TYPE_H264.to_owned(),
            clock_rate: 90000,
            channels: 0,
            sdp_fmtp_line: H264_FMTP.to_owned(),
            ..Default::default()
        },
    }
}

/// H.264 and Opus only. Opus carries NACK feedback so offers request audio
/// retransmission without any text patching; video NACK and PLI come from the
/// default interceptors.
fn media_engine() -> Result<MediaEngine, EngineError> {
    let mut media_engine = MediaEngine::default();

    media_engine
        .register_codec(
            RTCRtpCodecParameters {
                capability: codec_for(TrackKind::Video),
                payload_type: H264_PAYLOAD_TYPE,
                ..Default::default()
            },
            RTPCodecType::Video,
        )
        .map_err(rejected)?;

    media_engine
        .register_codec(
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    rtcp_feedback: vec![RTCPFeedback {
                        typ: "nack".to_owned(),
                        parameter: String::new(),
                    }],
                    ..codec_for(TrackKind::Audio)
                },
                payload_type: OPUS_PAYLOAD_TYPE,
                ..Default::default()
            },
            RTPCodecType::Audio,
        )
        .map_err(rejected)?;

    Ok(media_engine)
}

/// Factory for webrtc-rs peer connections
///
/// Every attached track becomes a `TrackLocalStaticSample` owned by its
/// connection; producers fetch it with [`sample_track`](Self::sample_track)
/// and write encoded samples.
pub struct WebRtcEngine {
    ice_servers: Vec<String>,
    connections: std::sync::Mutex<Vec<Weak<WebRtcPeerConnection>>>,
}

impl WebRtcEngine {
    pub fn new(ice_servers: Vec<String>) -> Self {
        Self {
            ice_servers,
            connections: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Sample track created for a captured track id, searched across live
    /// connections
    pub async fn sample_track(&self, track_id: &str) -> Option<Arc<TrackLocalStaticSample>> {
        let live: Vec<Arc<WebRtcPeerConnection>> = {
            let mut connections = self
                .connections
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            connections.retain(|c| c.strong_count() > 0);
            let live = connections.iter().filter_map(Weak::upgrade).collect();
            live
        };

        for connection in live {
            if let Some(track) = connection.sample_track(track_id).await {
                return Some(track);
            }
        }
        None
    }

    fn configuration(&self) -> RTCConfiguration {
        let ice_servers = if self.ice_servers.is_empty() {
            Vec::new()
        } else {
            vec![RTCIceServer {
                urls: self.ice_servers.clone(),
                ..Default::default()
            }]
        };

        RTCConfiguration {
            ice_servers,
            ..Default::default()
        }
    }
}

impl Default for WebRtcEngine {
    fn default() -> Self {
        Self::new(vec!["stun:stun.l.google.com:19302".to_string()])
    }
}

#[async_trait::async_trait]
impl PeerConnectionFactory for WebRtcEngine {
    async fn create(&self) -> Result<Arc<dyn PeerConnection>, EngineError> {
        let mut media_engine = media_engine()?;

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(rejected)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let pc = api
            .new_peer_connection(self.configuration())
            .await
            .map_err(rejected)?;

        info!("Created webrtc peer connection");

        let connection = Arc::new(WebRtcPeerConnection {
            pc: Arc::new(pc),
            sample_tracks: Mutex::new(HashMap::new()),
            generated_offer: Mutex::new(None),
        });

        self.connections
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(Arc::downgrade(&connection));

        Ok(connection)
    }

    fn name(&self) -> &str {
        "webrtc-rs"
    }
}

/// One webrtc-rs peer connection
pub struct WebRtcPeerConnection {
    pc: Arc<RTCPeerConnection>,
    sample_tracks: Mutex<HashMap<String, Arc<TrackLocalStaticSample>>>,
    /// Last offer text produced by the engine
    generated_offer: Mutex<Option<String>>,
}

impl WebRtcPeerConnection {
    /// Sample track attached for a captured track id
    pub async fn sample_track(&self, track_id: &str) -> Option<Arc<TrackLocalStaticSample>> {
        self.sample_tracks.lock().await.get(track_id).cloned()
    }
}

fn map_state(state: RTCPeerConnectionState) -> PeerConnectionState {
    match state {
        RTCPeerConnectionState::Unspecified => PeerConnectionState::Unspecified,
        RTCPeerConnectionState::New => PeerConnectionState::New,
        RTCPeerConnectionState::Connecting => PeerConnectionState::Connecting,
        RTCPeerConnectionState::Connected => PeerConnectionState::Connected,
        RTCPeerConnectionState::Disconnected => PeerConnectionState::Disconnected,
        RTCPeerConnectionState::Failed => PeerConnectionState::Failed,
        RTCPeerConnectionState::Closed => PeerConnectionState::Closed,
    }
}

fn to_native(description: SessionDescription) -> Result<RTCSessionDescription, EngineError> {
    match description.kind {
        SdpType::Offer => RTCSessionDescription::offer(description.sdp).map_err(rejected),
        SdpType::Answer => RTCSessionDescription::answer(description.sdp).map_err(rejected),
    }
}

#[async_trait::async_trait]
impl PeerConnection for WebRtcPeerConnection {
    fn on_connection_state_change(&self, handler: StateChangeHandler) {
        let handler: Arc<StateChangeHandler> = Arc::new(handler);
        self.pc
            .on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
                let handler = Arc::clone(&handler);
                Box::pin(async move {
                    handler(map_state(state));
                })
            }));
    }

    async fn add_track(
        &self,
        track: &MediaTrack,
        stream: &MediaStream,
    ) -> Result<(), EngineError> {
        let local = Arc::new(TrackLocalStaticSample::new(
            codec_for(track.kind),
            track.id.clone(),
            stream.id.clone(),
        ));

        self.pc
            .add_track(Arc::clone(&local) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(rejected)?;

        // WHIP only publishes
        for transceiver in self.pc.get_transceivers().await {
            if transceiver.sender().await.track().await.is_some() {
                transceiver
                    .set_direction(RTCRtpTransceiverDirection::Sendonly)
                    .await;
            }
        }

        self.sample_tracks
            .lock()
            .await
            .insert(track.id.clone(), local);

        debug!("Attached {} track {}", track.kind, track.id);
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription, EngineError> {
        let offer = self.pc.create_offer(None).await.map_err(rejected)?;
        *self.generated_offer.lock().await = Some(offer.sdp.clone());
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn set_local_description(
        &self,
        mut description: SessionDescription,
    ) -> Result<(), EngineError> {
        // webrtc-rs refuses an offer that differs from the one it generated
        if description.kind == SdpType::Offer {
            if let Some(generated) = self.generated_offer.lock().await.as_ref() {
                if *generated != description.sdp {
                    debug!("Rewritten offer replaced by the engine's own offer");
                    description.sdp = generated.clone();
                }
            }
        }
        let native = to_native(description)?;

        // No trickle ICE: the offer must carry every candidate
        let mut gathering_done = self.pc.gathering_complete_promise().await;
        self.pc
            .set_local_description(native)
            .await
            .map_err(rejected)?;
        let _ = gathering_done.recv().await;

        debug!("ICE gathering complete");
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        self.pc
            .local_description()
            .await
            .map(|d| SessionDescription::offer(d.sdp))
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), EngineError> {
        let native = to_native(description)?;
        self.pc
            .set_remote_description(native)
            .await
            .map_err(rejected)
    }

    async fn senders(&self) -> Vec<Arc<dyn RtpSender>> {
        self.pc
            .get_senders()
            .await
            .into_iter()
            .map(|sender| Arc::new(WebRtcSender { sender }) as Arc<dyn RtpSender>)
            .collect()
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.sample_tracks.lock().await.clear();
        self.pc.close().await.map_err(rejected)
    }
}

/// Sender wrapper
///
/// webrtc-rs has no per-encoding bitrate cap, so writes are reported as
/// unsupported and bandwidth shaping degrades to a logged warning.
struct WebRtcSender {
    sender: Arc<RTCRtpSender>,
}

#[async_trait::async_trait]
impl RtpSender for WebRtcSender {
    async fn track_kind(&self) -> Option<TrackKind> {
        match self.sender.track().await?.kind() {
            RTPCodecType::Audio => Some(TrackKind::Audio),
            RTPCodecType::Video => Some(TrackKind::Video),
            _ => None,
        }
    }

    async fn get_parameters(&self) -> SendParameters {
        let native = self.sender.get_parameters().await;
        SendParameters {
            encodings: native
                .encodings
                .iter()
                .map(|_| EncodingParameters::default())
                .collect(),
        }
    }

    async fn set_parameters(&self, _parameters: SendParameters) -> Result<(), EngineError> {
        Err(EngineError::Unsupported(
            "per-encoding max bitrate".to_string(),
        ))
    }
}

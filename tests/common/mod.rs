// Shared fixtures for integration tests
//
// - MockIngest: a WHIP endpoint served by axum on an ephemeral port
// - MockEngine / MockPeerConnection: scripted peer-connection engine
// - MockCapture: capture backend counting acquisitions and releases
// - Recorder: callback set that logs every hook invocation in order

#![allow(dead_code)]

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, post},
    Router,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower_http::trace::TraceLayer;
use whip_publish::capture::{CaptureConstraints, DeviceInfo, MediaStream, MediaTrack, TrackKind};
use whip_publish::engine::{
    EncodingParameters, PeerConnection, PeerConnectionFactory, PeerConnectionState, RtpSender,
    SendParameters, SessionDescription, StateChangeHandler,
};
use whip_publish::{CaptureBackend, CaptureError, Callbacks, EngineError, VideoSink};

pub const OFFER: &str = "v=0\r\n\
o=- 4611731400430051336 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
a=group:BUNDLE 0 1\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111 63\r\n\
c=IN IP4 0.0.0.0\r\n\
a=mid:0\r\n\
a=sendonly\r\n\
a=rtpmap:111 opus/48000/2\r\n\
a=fmtp:111 minptime=10;useinbandfec=1\r\n\
a=rtpmap:63 red/48000/2\r\n\
m=video 9 UDP/TLS/RTP/SAVPF 96\r\n\
c=IN IP4 0.0.0.0\r\n\
a=mid:1\r\n\
a=sendonly\r\n\
a=rtpmap:96 VP8/90000\r\n\
a=rtcp-fb:96 nack\r\n";

pub const ANSWER: &str = "v=0\r\n\
o=- 1 2 IN IP4 10.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
a=mid:0\r\n\
a=recvonly\r\n\
a=rtpmap:111 opus/48000/2\r\n\
m=video 9 UDP/TLS/RTP/SAVPF 96\r\n\
a=mid:1\r\n\
a=recvonly\r\n\
a=rtpmap:96 VP8/90000\r\n";

// ============================================================================
// Mock WHIP ingest
// ============================================================================

#[derive(Debug, Clone)]
pub struct IngestBehavior {
    pub post_status: StatusCode,
    pub location: Option<String>,
    pub answer: String,
    pub delete_status: StatusCode,
    pub post_delay: Option<Duration>,
}

impl Default for IngestBehavior {
    fn default() -> Self {
        Self {
            post_status: StatusCode::CREATED,
            location: Some("/sessions/42".to_string()),
            answer: ANSWER.to_string(),
            delete_status: StatusCode::OK,
            post_delay: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReceivedOffer {
    pub content_type: Option<String>,
    pub authorization: Option<String>,
    pub body: String,
}

#[derive(Debug, Default)]
pub struct IngestLog {
    pub offers: Vec<ReceivedOffer>,
    pub deletes: Vec<String>,
}

#[derive(Clone)]
struct IngestState {
    behavior: Arc<IngestBehavior>,
    log: Arc<Mutex<IngestLog>>,
}

pub struct MockIngest {
    pub base: String,
    log: Arc<Mutex<IngestLog>>,
}

impl MockIngest {
    pub async fn start(behavior: IngestBehavior) -> Self {
        let log = Arc::new(Mutex::new(IngestLog::default()));
        let state = IngestState {
            behavior: Arc::new(behavior),
            log: Arc::clone(&log),
        };

        let app = Router::new()
            .route("/whip", post(receive_offer))
            .route("/sessions/:id", delete(delete_session))
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{}", addr),
            log,
        }
    }

    pub fn whip_url(&self) -> String {
        format!("{}/whip", self.base)
    }

    pub fn offers(&self) -> Vec<ReceivedOffer> {
        self.log.lock().unwrap().offers.clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.log.lock().unwrap().deletes.clone()
    }
}

async fn receive_offer(
    State(state): State<IngestState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let header_text = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    };

    state.log.lock().unwrap().offers.push(ReceivedOffer {
        content_type: header_text(header::CONTENT_TYPE),
        authorization: header_text(header::AUTHORIZATION),
        body,
    });

    if let Some(delay) = state.behavior.post_delay {
        tokio::time::sleep(delay).await;
    }

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/sdp"),
    );
    if let Some(location) = &state.behavior.location {
        response_headers.insert(header::LOCATION, HeaderValue::from_str(location).unwrap());
    }

    (
        state.behavior.post_status,
        response_headers,
        state.behavior.answer.clone(),
    )
        .into_response()
}

async fn delete_session(
    State(state): State<IngestState>,
    Path(id): Path<String>,
) -> StatusCode {
    state
        .log
        .lock()
        .unwrap()
        .deletes
        .push(format!("/sessions/{}", id));
    state.behavior.delete_status
}

// ============================================================================
// Mock peer-connection engine
// ============================================================================

pub struct MockSender {
    pub kind: TrackKind,
    pub parameters: Mutex<SendParameters>,
}

#[async_trait::async_trait]
impl RtpSender for MockSender {
    async fn track_kind(&self) -> Option<TrackKind> {
        Some(self.kind)
    }

    async fn get_parameters(&self) -> SendParameters {
        self.parameters.lock().unwrap().clone()
    }

    async fn set_parameters(&self, parameters: SendParameters) -> Result<(), EngineError> {
        *self.parameters.lock().unwrap() = parameters;
        Ok(())
    }
}

#[derive(Default)]
pub struct MockPeerConnection {
    handler: Mutex<Option<StateChangeHandler>>,
    pub senders: Mutex<Vec<Arc<MockSender>>>,
    pub local: Mutex<Option<SessionDescription>>,
    pub remote: Mutex<Option<SessionDescription>>,
    pub closed: Mutex<usize>,
    reject_remote: bool,
}

impl MockPeerConnection {
    /// Deliver an engine state change to the installed observer
    pub fn emit(&self, state: PeerConnectionState) {
        if let Some(handler) = self.handler.lock().unwrap().as_ref() {
            handler(state);
        }
    }

    pub fn video_max_bitrate(&self) -> Option<u64> {
        self.senders
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.kind == TrackKind::Video)
            .and_then(|s| {
                s.parameters
                    .lock()
                    .unwrap()
                    .encodings
                    .first()
                    .and_then(|e| e.max_bitrate)
            })
    }

    pub fn close_count(&self) -> usize {
        *self.closed.lock().unwrap()
    }

    pub fn sender_count(&self) -> usize {
        self.senders.lock().unwrap().len()
    }

    pub fn local_sdp(&self) -> Option<String> {
        self.local.lock().unwrap().as_ref().map(|d| d.sdp.clone())
    }

    pub fn remote_sdp(&self) -> Option<String> {
        self.remote.lock().unwrap().as_ref().map(|d| d.sdp.clone())
    }
}

#[async_trait::async_trait]
impl PeerConnection for MockPeerConnection {
    fn on_connection_state_change(&self, handler: StateChangeHandler) {
        *self.handler.lock().unwrap() = Some(handler);
    }

    async fn add_track(&self, track: &MediaTrack, _stream: &MediaStream) -> Result<(), EngineError> {
        self.senders.lock().unwrap().push(Arc::new(MockSender {
            kind: track.kind,
            parameters: Mutex::new(SendParameters {
                encodings: vec![EncodingParameters::default()],
            }),
        }));
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription, EngineError> {
        Ok(SessionDescription::offer(OFFER))
    }

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), EngineError> {
        *self.local.lock().unwrap() = Some(description);
        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), EngineError> {
        if self.reject_remote {
            return Err(EngineError::Rejected("malformed answer".to_string()));
        }
        *self.remote.lock().unwrap() = Some(description);
        Ok(())
    }

    async fn senders(&self) -> Vec<Arc<dyn RtpSender>> {
        self.senders
            .lock()
            .unwrap()
            .iter()
            .map(|s| Arc::clone(s) as Arc<dyn RtpSender>)
            .collect()
    }

    async fn close(&self) -> Result<(), EngineError> {
        *self.closed.lock().unwrap() += 1;
        // Real engines report the close to the observer
        self.emit(PeerConnectionState::Closed);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockEngine {
    pub connections: Mutex<Vec<Arc<MockPeerConnection>>>,
    pub reject_remote: bool,
}

impl MockEngine {
    pub fn rejecting_answers() -> Self {
        Self {
            reject_remote: true,
            ..Default::default()
        }
    }

    pub fn connection(&self) -> Arc<MockPeerConnection> {
        Arc::clone(
            self.connections
                .lock()
                .unwrap()
                .last()
                .expect("no peer connection created"),
        )
    }

    pub fn created(&self) -> usize {
        self.connections.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl PeerConnectionFactory for MockEngine {
    async fn create(&self) -> Result<Arc<dyn PeerConnection>, EngineError> {
        let pc = Arc::new(MockPeerConnection {
            reject_remote: self.reject_remote,
            ..Default::default()
        });
        self.connections.lock().unwrap().push(Arc::clone(&pc));
        Ok(pc)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ============================================================================
// Mock capture
// ============================================================================

#[derive(Default)]
pub struct MockCapture {
    pub acquired: Mutex<usize>,
    pub released: Mutex<usize>,
    pub fail: bool,
}

impl MockCapture {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn acquired(&self) -> usize {
        *self.acquired.lock().unwrap()
    }

    pub fn released(&self) -> usize {
        *self.released.lock().unwrap()
    }
}

pub fn stream_with(kinds: &[TrackKind]) -> MediaStream {
    kinds.iter().fold(MediaStream::new("stream-1"), |stream, kind| {
        stream.with_track(MediaTrack {
            id: format!("{}-track", kind),
            kind: *kind,
            label: format!("mock {}", kind),
        })
    })
}

#[async_trait::async_trait]
impl CaptureBackend for MockCapture {
    async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<MediaStream, CaptureError> {
        if self.fail {
            return Err(CaptureError::Acquisition("permission denied".to_string()));
        }
        *self.acquired.lock().unwrap() += 1;

        let mut kinds = Vec::new();
        if constraints.audio {
            kinds.push(TrackKind::Audio);
        }
        if constraints.video {
            kinds.push(TrackKind::Video);
        }
        Ok(stream_with(&kinds))
    }

    async fn video_inputs(&self) -> Result<Vec<DeviceInfo>, CaptureError> {
        Ok(vec![
            DeviceInfo {
                device_id: "cam-1".to_string(),
                label: "Front".to_string(),
            },
            DeviceInfo {
                device_id: "cam-2".to_string(),
                label: String::new(),
            },
        ])
    }

    async fn release(&self, _stream: &MediaStream) {
        *self.released.lock().unwrap() += 1;
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[derive(Default)]
pub struct MockSink {
    pub events: Mutex<Vec<String>>,
}

impl MockSink {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl VideoSink for MockSink {
    fn attach(&self, stream: &MediaStream) {
        self.events
            .lock()
            .unwrap()
            .push(format!("attach:{}", stream.id));
    }

    fn detach(&self) {
        self.events.lock().unwrap().push("detach".to_string());
    }
}

// ============================================================================
// Callback recorder
// ============================================================================

#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn callbacks(&self) -> Callbacks {
        let created = Arc::clone(&self.events);
        let state = Arc::clone(&self.events);
        let offer = Arc::clone(&self.events);
        let answer = Arc::clone(&self.events);
        let error = Arc::clone(&self.events);

        Callbacks::new()
            .on_publisher_created(move |_| created.lock().unwrap().push("created".to_string()))
            .on_connection_state_change(move |s| {
                state.lock().unwrap().push(format!("state:{}", s))
            })
            .on_offer(move |_| offer.lock().unwrap().push("offer".to_string()))
            .on_answer(move |_| answer.lock().unwrap().push("answer".to_string()))
            .on_connection_error(move |m| error.lock().unwrap().push(format!("error:{}", m)))
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.starts_with("error:"))
            .collect()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }
}

use super::settings::Settings;
use super::state::{ConnectionStatus, SessionEvent, SessionState, StateCell};
use super::stats::SessionStats;
use crate::capture::{label_video_inputs, CaptureBackend, DeviceInfo, MediaStream};
use crate::engine::{PeerConnection, PeerConnectionFactory, SessionDescription};
use crate::error::{CaptureError, PublishError, Result, TransportError};
use crate::negotiation;
use crate::transport::WhipTransport;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use url::Url;

/// Delay between the WHIP DELETE and closing the peer connection.
///
/// RTP keeps flowing for this long after the DELETE so the ingest sees a
/// graceful end instead of waiting for an ICE timeout.
pub const CLOSE_GRACE_PERIOD: Duration = Duration::from_millis(200);

const EVENT_CAPACITY: usize = 16;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Stream held by the session, and whether the capture backend produced it
struct HeldStream {
    stream: MediaStream,
    acquired: bool,
}

/// A WHIP publishing session
///
/// One session publishes once. `publish()` and `stop()` take `&self`, so a
/// session shared through an `Arc` can be stopped from another task while
/// negotiation is still running.
pub struct Session {
    /// Session identifier for logs and stats
    id: String,

    /// Configuration snapshot
    settings: Settings,

    /// Capture device layer
    capture: Arc<dyn CaptureBackend>,

    /// Peer-connection engine
    engine: Arc<dyn PeerConnectionFactory>,

    /// WHIP HTTP signaling
    transport: WhipTransport,

    /// Lifecycle state
    state: StateCell,

    /// State change broadcast
    events: broadcast::Sender<SessionEvent>,

    /// Published stream
    stream: Mutex<Option<HeldStream>>,

    /// Peer connection, present from creation until stop
    peer_connection: Mutex<Option<Arc<dyn PeerConnection>>>,

    /// WHIP session resource returned by the endpoint
    location: Mutex<Option<Url>>,

    /// Last status seen by the connection observer
    connection_status: Arc<Mutex<Option<ConnectionStatus>>>,

    /// Silences the observer once the connection is being closed
    observer_muted: Arc<AtomicBool>,

    created_at: DateTime<Utc>,

    publishing_since: Mutex<Option<DateTime<Utc>>>,
}

impl Session {
    /// Create a session; fires `on_publisher_created`
    pub fn new(
        settings: Settings,
        capture: Arc<dyn CaptureBackend>,
        engine: Arc<dyn PeerConnectionFactory>,
    ) -> Self {
        let transport = WhipTransport::new(settings.auth_token.clone());
        Self::with_transport(settings, capture, engine, transport)
    }

    /// Create a session with a preconfigured transport
    pub fn with_transport(
        settings: Settings,
        capture: Arc<dyn CaptureBackend>,
        engine: Arc<dyn PeerConnectionFactory>,
        transport: WhipTransport,
    ) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        info!("Creating publishing session: {}", id);
        info!(
            "Settings: url={} resolution={}x{} bandwidth={:?} audio={} video={} capture={} engine={}",
            settings.whip_url,
            settings.width,
            settings.height,
            settings.video_bandwidth,
            settings.audio_required,
            settings.video_required,
            capture.name(),
            engine.name()
        );

        settings.callbacks.publisher_created(&settings);

        Self {
            id,
            settings,
            capture,
            engine,
            transport,
            state: StateCell::new(SessionState::Idle),
            events,
            stream: Mutex::new(None),
            peer_connection: Mutex::new(None),
            location: Mutex::new(None),
            connection_status: Arc::new(Mutex::new(None)),
            observer_muted: Arc::new(AtomicBool::new(false)),
            created_at: Utc::now(),
            publishing_since: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> SessionState {
        self.state.load()
    }

    /// WHIP session resource, once the endpoint returned one
    pub fn location(&self) -> Option<Url> {
        lock(&self.location).clone()
    }

    pub fn connection_status(&self) -> Option<ConnectionStatus> {
        *lock(&self.connection_status)
    }

    /// Receive lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Video inputs the capture backend can publish from
    pub async fn video_inputs(&self) -> std::result::Result<Vec<DeviceInfo>, CaptureError> {
        let devices = self.capture.video_inputs().await?;
        Ok(label_video_inputs(devices))
    }

    /// Current session statistics
    pub fn stats(&self) -> SessionStats {
        let publishing_since = *lock(&self.publishing_since);
        let publishing_secs = publishing_since
            .map(|since| Utc::now().signed_duration_since(since).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0);

        SessionStats {
            session_id: self.id.clone(),
            state: self.state(),
            connection_status: self.connection_status(),
            location: self.location().map(|url| url.to_string()),
            created_at: self.created_at,
            publishing_since,
            publishing_secs,
        }
    }

    fn transition(&self, from: SessionState, to: SessionState) -> std::result::Result<(), SessionState> {
        self.state.transition(from, to)?;
        debug!("Session {}: {} -> {}", self.id, from, to);
        let _ = self.events.send(SessionEvent::StateChanged { from, to });
        Ok(())
    }

    fn ensure_negotiating(&self) -> Result<()> {
        if self.state() == SessionState::Negotiating {
            Ok(())
        } else {
            Err(PublishError::Cancelled)
        }
    }

    /// Negotiate and start publishing
    ///
    /// Valid only once, from `Idle`. Failures are reported through
    /// `on_connection_error` and leave the session in `Failed`; a publish
    /// interrupted by `stop()` returns [`PublishError::Cancelled`] silently.
    pub async fn publish(&self) -> Result<()> {
        self.transition(SessionState::Idle, SessionState::Negotiating)
            .map_err(|state| PublishError::InvalidState { state })?;

        info!("Publishing session {} to {}", self.id, self.settings.whip_url);

        match self.negotiate().await {
            Ok(()) => {
                self.transition(SessionState::Negotiating, SessionState::Publishing)
                    .map_err(|_| PublishError::Cancelled)?;
                *lock(&self.publishing_since) = Some(Utc::now());
                info!("Session {} is publishing", self.id);
                Ok(())
            }
            Err(e) if self.state() != SessionState::Negotiating => {
                info!("Publish of session {} cancelled: {}", self.id, e);
                Err(PublishError::Cancelled)
            }
            Err(e) => {
                let message = publish_failure_message(&e);
                error!("Session {} failed to publish: {}", self.id, e);
                self.settings.callbacks.connection_error(&message);
                let _ = self.transition(SessionState::Negotiating, SessionState::Failed);
                Err(e)
            }
        }
    }

    async fn negotiate(&self) -> Result<()> {
        let url = Url::parse(&self.settings.whip_url)
            .map_err(|e| PublishError::InvalidUrl(format!("{}: {}", self.settings.whip_url, e)))?;

        let held = match &self.settings.stream {
            Some(stream) => HeldStream {
                stream: stream.clone(),
                acquired: false,
            },
            None => HeldStream {
                stream: self.capture.acquire(&self.settings.constraints()).await?,
                acquired: true,
            },
        };
        let stream = held.stream.clone();
        self.adopt_stream(held).await?;

        let pc = self.engine.create().await?;
        self.adopt_peer_connection(Arc::clone(&pc)).await?;
        self.observe(pc.as_ref());

        for track in &stream.tracks {
            pc.add_track(track, &stream).await?;
        }

        let offer = negotiation::build_offer(pc.as_ref()).await?;
        let mangled = negotiation::mangle_for_nack(&offer.sdp);
        pc.set_local_description(SessionDescription::offer(mangled.clone()))
            .await?;

        // Engines that gather candidates hand back a rewritten description
        let offer_sdp = match pc.local_description().await {
            Some(local) => negotiation::mangle_for_nack(&local.sdp),
            None => mangled,
        };

        debug!("Offer:\n{}", offer_sdp);
        self.settings.callbacks.offer(&offer_sdp);

        self.ensure_negotiating()?;
        let answer = self.transport.send_offer(&url, &offer_sdp).await?;

        if let Some(location) = answer.location {
            self.adopt_location(location).await?;
        }

        debug!("Answer:\n{}", answer.sdp);
        self.settings.callbacks.answer(&answer.sdp);

        let missing = negotiation::missing_media(&offer_sdp, &answer.sdp);
        if !missing.is_empty() {
            warn!(
                "Answer does not mirror offered media sections: {}",
                missing.join(", ")
            );
        }

        pc.set_remote_description(SessionDescription::answer(answer.sdp))
            .await?;

        let bandwidth = self.settings.video_bandwidth.as_deref().unwrap_or("");
        negotiation::apply_bandwidth_shaping(pc.as_ref(), bandwidth).await;

        Ok(())
    }

    /// Keep the stream unless `stop()` already began
    async fn adopt_stream(&self, held: HeldStream) -> Result<()> {
        let rejected = {
            let mut slot = lock(&self.stream);
            if self.state() == SessionState::Negotiating {
                if let Some(sink) = &self.settings.video_sink {
                    sink.attach(&held.stream);
                }
                *slot = Some(held);
                None
            } else {
                Some(held)
            }
        };

        match rejected {
            None => Ok(()),
            Some(held) => {
                if held.acquired {
                    self.capture.release(&held.stream).await;
                }
                Err(PublishError::Cancelled)
            }
        }
    }

    /// Keep the peer connection unless `stop()` already began
    async fn adopt_peer_connection(&self, pc: Arc<dyn PeerConnection>) -> Result<()> {
        let rejected = {
            let mut slot = lock(&self.peer_connection);
            if self.state() == SessionState::Negotiating {
                *slot = Some(pc);
                None
            } else {
                Some(pc)
            }
        };

        match rejected {
            None => Ok(()),
            Some(pc) => {
                if let Err(e) = pc.close().await {
                    warn!("Failed to close peer connection: {}", e);
                }
                Err(PublishError::Cancelled)
            }
        }
    }

    /// Keep the Location unless `stop()` already began, in which case the
    /// resource is deleted here since stop has nothing to delete
    async fn adopt_location(&self, location: Url) -> Result<()> {
        let rejected = {
            let mut slot = lock(&self.location);
            if self.state() == SessionState::Negotiating {
                *slot = Some(location);
                None
            } else {
                Some(location)
            }
        };

        match rejected {
            None => Ok(()),
            Some(location) => {
                self.delete_resource(&location).await;
                Err(PublishError::Cancelled)
            }
        }
    }

    fn observe(&self, pc: &dyn PeerConnection) {
        let session_id = self.id.clone();
        let status = Arc::clone(&self.connection_status);
        let muted = Arc::clone(&self.observer_muted);
        let callbacks = self.settings.callbacks.clone();

        pc.on_connection_state_change(Box::new(move |raw| {
            if muted.load(Ordering::SeqCst) {
                return;
            }
            let Some(normalized) = ConnectionStatus::from_engine(raw) else {
                return;
            };

            info!("Session {} connection state: {}", session_id, normalized);
            *lock(&status) = Some(normalized);
            callbacks.connection_state_change(normalized);
        }));
    }

    async fn delete_resource(&self, location: &Url) {
        if let Err(e) = self.transport.delete_session(location).await {
            let message = delete_failure_message(&e);
            error!("Failed to delete session [{}]: {}", location, e);
            self.settings.callbacks.connection_error(&message);
        }
    }

    /// Tear the session down
    ///
    /// No-op before `publish()` and after a previous stop. Otherwise deletes
    /// the WHIP resource, waits [`CLOSE_GRACE_PERIOD`], closes the peer
    /// connection and always ends in `Stopped`.
    pub async fn stop(&self) -> SessionStats {
        let from = loop {
            let current = self.state();
            if !current.can_stop() {
                debug!("Session {}: stop ignored in state {}", self.id, current);
                return self.stats();
            }
            if self.transition(current, SessionState::Stopping).is_ok() {
                break current;
            }
        };

        info!("Stopping session {} (was {})", self.id, from);

        let location = lock(&self.location).take();
        if let Some(location) = location {
            self.delete_resource(&location).await;
        }

        if let Some(sink) = &self.settings.video_sink {
            let _slot = lock(&self.stream);
            sink.detach();
        }

        tokio::time::sleep(CLOSE_GRACE_PERIOD).await;

        self.observer_muted.store(true, Ordering::SeqCst);

        let pc = lock(&self.peer_connection).take();
        if let Some(pc) = pc {
            if let Err(e) = pc.close().await {
                warn!("Failed to close peer connection: {}", e);
            }
        }

        let held = lock(&self.stream).take();
        if let Some(held) = held {
            if held.acquired {
                self.capture.release(&held.stream).await;
            }
        }

        *lock(&self.connection_status) = Some(ConnectionStatus::Disconnected);
        self.settings
            .callbacks
            .connection_state_change(ConnectionStatus::Disconnected);

        let _ = self.transition(SessionState::Stopping, SessionState::Stopped);
        info!("Session {} stopped", self.id);

        self.stats()
    }
}

fn publish_failure_message(e: &PublishError) -> String {
    match e {
        PublishError::Transport(TransportError::Status { status }) => {
            format!("Connection error {}", status)
        }
        PublishError::Transport(TransportError::Network(_)) => "Connection error".to_string(),
        other => other.to_string(),
    }
}

fn delete_failure_message(e: &TransportError) -> String {
    match e {
        TransportError::Status { status } => format!("failed to delete session {}", status),
        TransportError::Network(detail) => format!("Connection error {}", detail),
    }
}

use super::state::ConnectionStatus;
use crate::capture::{CaptureConstraints, MediaStream, VideoSink};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Hook receiving text (offer, answer or error message)
pub type TextHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Hook receiving normalized connection states
pub type StateHook = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;

/// Hook receiving the settings a publisher was created with
pub type SettingsHook = Arc<dyn Fn(&Settings) + Send + Sync>;

/// Lifecycle hooks; an unset slot is a no-op
#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_publisher_created: Option<SettingsHook>,
    pub on_connection_state_change: Option<StateHook>,
    pub on_offer: Option<TextHook>,
    pub on_answer: Option<TextHook>,
    pub on_connection_error: Option<TextHook>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_publisher_created(mut self, f: impl Fn(&Settings) + Send + Sync + 'static) -> Self {
        self.on_publisher_created = Some(Arc::new(f));
        self
    }

    pub fn on_connection_state_change(
        mut self,
        f: impl Fn(ConnectionStatus) + Send + Sync + 'static,
    ) -> Self {
        self.on_connection_state_change = Some(Arc::new(f));
        self
    }

    pub fn on_offer(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_offer = Some(Arc::new(f));
        self
    }

    pub fn on_answer(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_answer = Some(Arc::new(f));
        self
    }

    pub fn on_connection_error(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_connection_error = Some(Arc::new(f));
        self
    }

    pub(crate) fn publisher_created(&self, settings: &Settings) {
        if let Some(f) = &self.on_publisher_created {
            f(settings);
        }
    }

    pub(crate) fn connection_state_change(&self, status: ConnectionStatus) {
        if let Some(f) = &self.on_connection_state_change {
            f(status);
        }
    }

    pub(crate) fn offer(&self, sdp: &str) {
        if let Some(f) = &self.on_offer {
            f(sdp);
        }
    }

    pub(crate) fn answer(&self, sdp: &str) {
        if let Some(f) = &self.on_answer {
            f(sdp);
        }
    }

    pub(crate) fn connection_error(&self, message: &str) {
        if let Some(f) = &self.on_connection_error {
            f(message);
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_publisher_created", &self.on_publisher_created.is_some())
            .field(
                "on_connection_state_change",
                &self.on_connection_state_change.is_some(),
            )
            .field("on_offer", &self.on_offer.is_some())
            .field("on_answer", &self.on_answer.is_some())
            .field("on_connection_error", &self.on_connection_error.is_some())
            .finish()
    }
}

/// Log verbosity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_tracing(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

/// Parse a `WIDTHxHEIGHT` resolution such as `1280x720`
pub fn parse_resolution(raw: &str) -> Option<(u32, u32)> {
    let (w, h) = raw.trim().split_once(['x', 'X'])?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

/// Publisher configuration, fixed for the lifetime of a session
#[derive(Clone, Debug)]
pub struct Settings {
    /// WHIP endpoint URL
    pub whip_url: String,

    /// Requested capture width in pixels
    pub width: u32,

    /// Requested capture height in pixels
    pub height: u32,

    /// Video bitrate cap in kbps, as entered. Unparsable or absent clears the cap
    pub video_bandwidth: Option<String>,

    /// Capture and send video
    pub video_required: bool,

    /// Capture and send audio
    pub audio_required: bool,

    /// Exact video input to capture from
    pub device_id: Option<String>,

    /// Verbosity for the binary's subscriber
    pub log_level: LogLevel,

    /// Bearer token for the WHIP endpoint
    pub auth_token: Option<String>,

    /// Pre-acquired stream; capture is skipped when set
    pub stream: Option<MediaStream>,

    /// Local preview
    pub video_sink: Option<Arc<dyn VideoSink>>,

    pub callbacks: Callbacks,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            whip_url: String::new(),
            width: 640,
            height: 480,
            video_bandwidth: None,
            video_required: true,
            audio_required: false,
            device_id: None,
            log_level: LogLevel::Error,
            auth_token: None,
            stream: None,
            video_sink: None,
            callbacks: Callbacks::default(),
        }
    }
}

impl Settings {
    pub fn new(whip_url: impl Into<String>) -> Self {
        Self {
            whip_url: whip_url.into(),
            ..Default::default()
        }
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_video_bandwidth(mut self, kbps: impl Into<String>) -> Self {
        self.video_bandwidth = Some(kbps.into());
        self
    }

    pub fn with_audio(mut self, required: bool) -> Self {
        self.audio_required = required;
        self
    }

    pub fn with_video(mut self, required: bool) -> Self {
        self.video_required = required;
        self
    }

    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_stream(mut self, stream: MediaStream) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn with_video_sink(mut self, sink: Arc<dyn VideoSink>) -> Self {
        self.video_sink = Some(sink);
        self
    }

    pub fn with_callbacks(mut self, callbacks: Callbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Capture constraints derived from these settings
    pub fn constraints(&self) -> CaptureConstraints {
        CaptureConstraints {
            audio: self.audio_required,
            video: self.video_required,
            width: self.width,
            height: self.height,
            device_id: self.device_id.clone().filter(|_| self.video_required),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_defaults() {
        let settings = Settings::default();

        assert_eq!(settings.width, 640);
        assert_eq!(settings.height, 480);
        assert!(settings.video_required);
        assert!(!settings.audio_required);
        assert_eq!(settings.log_level, LogLevel::Error);
        assert!(settings.video_bandwidth.is_none());
    }

    #[test]
    fn test_constraints() {
        let settings = Settings::new("https://ingest.example/whip")
            .with_resolution(1920, 1080)
            .with_audio(true)
            .with_device("cam-1");

        let c = settings.constraints();
        assert!(c.audio);
        assert!(c.video);
        assert_eq!((c.width, c.height), (1920, 1080));
        assert_eq!(c.device_id.as_deref(), Some("cam-1"));

        // Device selection only applies to video
        let c = settings.with_video(false).constraints();
        assert_eq!(c.device_id, None);
    }

    #[test]
    fn test_parse_resolution() {
        assert_eq!(parse_resolution("1280x720"), Some((1280, 720)));
        assert_eq!(parse_resolution(" 640 X 480 "), Some((640, 480)));
        assert_eq!(parse_resolution("1280"), None);
        assert_eq!(parse_resolution("axb"), None);
    }

    #[test]
    fn test_log_level_parse_and_order() {
        assert_eq!("INFO".parse::<LogLevel>(), Ok(LogLevel::Info));
        assert!("loud".parse::<LogLevel>().is_err());
        assert!(LogLevel::Debug > LogLevel::Info);
        assert_eq!(LogLevel::Warn.as_tracing(), tracing::Level::WARN);
    }

    #[test]
    fn test_unset_callbacks_are_noops() {
        let callbacks = Callbacks::new();
        callbacks.offer("v=0");
        callbacks.connection_error("boom");
        callbacks.connection_state_change(ConnectionStatus::Connected);
    }

    #[test]
    fn test_callbacks_dispatch() {
        let errors = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&errors);
        let callbacks = Callbacks::new().on_connection_error(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        callbacks.connection_error("Connection error 500");
        callbacks.offer("ignored");

        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert!(format!("{:?}", callbacks).contains("on_connection_error: true"));
    }
}

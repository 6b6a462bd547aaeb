use crate::session::{LogLevel, Settings};
use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub publisher: PublisherConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublisherConfig {
    pub whip_url: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Kept as text: anything that is not a non-negative integer clears the cap
    #[serde(default)]
    pub video_bandwidth: Option<String>,
    #[serde(default = "default_true")]
    pub video: bool,
    #[serde(default)]
    pub audio: bool,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub log_level: LogLevel,
    #[serde(default)]
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_ice_servers")]
    pub ice_servers: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ice_servers: default_ice_servers(),
        }
    }
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

fn default_true() -> bool {
    true
}

fn default_ice_servers() -> Vec<String> {
    vec!["stun:stun.l.google.com:19302".to_string()]
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()
            .with_context(|| format!("Failed to read config {}", path))?;

        Ok(settings.try_deserialize()?)
    }
}

impl PublisherConfig {
    /// Defaults for everything but the endpoint
    pub fn new(whip_url: impl Into<String>) -> Self {
        Self {
            whip_url: whip_url.into(),
            width: default_width(),
            height: default_height(),
            video_bandwidth: None,
            video: true,
            audio: false,
            device_id: None,
            log_level: LogLevel::default(),
            auth_token: None,
        }
    }

    /// Settings without callbacks, stream or sink
    pub fn into_settings(self) -> Settings {
        Settings {
            whip_url: self.whip_url,
            width: self.width,
            height: self.height,
            video_bandwidth: self.video_bandwidth,
            video_required: self.video,
            audio_required: self.audio,
            device_id: self.device_id,
            log_level: self.log_level,
            auth_token: self.auth_token,
            ..Default::default()
        }
    }
}

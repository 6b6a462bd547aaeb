use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use whip_publish::config::{EngineConfig, PublisherConfig};
use whip_publish::engine::webrtc_rs::WebRtcEngine;
use whip_publish::session::parse_resolution;
use whip_publish::{Callbacks, Config, LogLevel, Session, StaticCapture};

/// Negotiate a WHIP session with an ingest endpoint
///
/// Signaling only: tracks come from `StaticCapture` and no encoder feeds
/// them, so the session stays up without carrying media.
#[derive(Parser, Debug)]
#[command(name = "whip-publish", version)]
struct Args {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/whip-publish")]
    config: String,

    /// WHIP endpoint URL
    #[arg(long)]
    url: Option<String>,

    /// Video bitrate cap in kbps
    #[arg(long)]
    bandwidth: Option<String>,

    /// Capture resolution, e.g. 1280x720
    #[arg(long)]
    resolution: Option<String>,

    /// Video input device id
    #[arg(long)]
    device: Option<String>,

    /// Publish audio
    #[arg(long)]
    audio: bool,

    /// Do not publish video
    #[arg(long)]
    no_video: bool,

    /// Bearer token for the endpoint
    #[arg(long)]
    token: Option<String>,

    /// error, warn, info, debug or trace
    #[arg(long)]
    log_level: Option<LogLevel>,

    /// List video inputs and exit
    #[arg(long)]
    list_devices: bool,
}

fn load(args: &Args) -> Result<(PublisherConfig, EngineConfig)> {
    let (mut publisher, engine) = match Config::load(&args.config) {
        Ok(cfg) => (cfg.publisher, cfg.engine),
        Err(e) => match &args.url {
            Some(url) => {
                eprintln!("No usable config ({:#}), using defaults", e);
                (PublisherConfig::new(url.clone()), EngineConfig::default())
            }
            None => return Err(e),
        },
    };

    if let Some(url) = &args.url {
        publisher.whip_url = url.clone();
    }
    if let Some(bandwidth) = &args.bandwidth {
        publisher.video_bandwidth = Some(bandwidth.clone());
    }
    if let Some(resolution) = &args.resolution {
        let (width, height) = parse_resolution(resolution)
            .with_context(|| format!("Invalid resolution: {}", resolution))?;
        publisher.width = width;
        publisher.height = height;
    }
    if let Some(device) = &args.device {
        publisher.device_id = Some(device.clone());
    }
    if args.audio {
        publisher.audio = true;
    }
    if args.no_video {
        publisher.video = false;
    }
    if let Some(token) = &args.token {
        publisher.auth_token = Some(token.clone());
    }
    if let Some(level) = args.log_level {
        publisher.log_level = level;
    }

    Ok((publisher, engine))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (publisher, engine_config) = load(&args)?;

    tracing_subscriber::fmt()
        .with_max_level(publisher.log_level.as_tracing())
        .init();

    info!("whip-publish v{}", env!("CARGO_PKG_VERSION"));

    let callbacks = Callbacks::new()
        .on_publisher_created(|_| info!("Ready to WebRTC publishing"))
        .on_connection_state_change(|status| info!("Connection state change: {}", status))
        .on_offer(|sdp| debug!("SDP offer:\n{}", sdp))
        .on_answer(|sdp| debug!("SDP answer:\n{}", sdp))
        .on_connection_error(|message| error!("{}", message));

    let settings = publisher.into_settings().with_callbacks(callbacks);
    let capture = Arc::new(StaticCapture::new());
    let engine = Arc::new(WebRtcEngine::new(engine_config.ice_servers));
    let session = Session::new(settings, capture, engine);

    if args.list_devices {
        for device in session.video_inputs().await? {
            println!("{}\t{}", device.device_id, device.label);
        }
        return Ok(());
    }

    if let Err(e) = session.publish().await {
        session.stop().await;
        return Err(e).context("Publish failed");
    }

    info!("Session negotiated (no media source attached); press Ctrl-C to stop");
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
    }

    let stats = session.stop().await;
    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}

use crate::capture::TrackKind;
use crate::engine::{EncodingParameters, PeerConnection};
use tracing::{info, warn};

/// Parse a configured bandwidth in kbps.
///
/// Surrounding whitespace is ignored; anything that is not a non-negative
/// integer yields `None`.
pub fn parse_bandwidth_kbps(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok()
}

/// Bitrate cap in bits per second for a configured kbps value.
pub fn max_bitrate_bps(raw: &str) -> Option<u64> {
    parse_bandwidth_kbps(raw).map(|kbps| kbps.saturating_mul(1000))
}

/// Cap (or uncap) the bitrate of every outbound video sender.
///
/// Best effort: failures are logged and never returned.
pub async fn apply_bandwidth_shaping(pc: &dyn PeerConnection, bandwidth_kbps: &str) {
    let max_bitrate = max_bitrate_bps(bandwidth_kbps);

    for sender in pc.senders().await {
        if sender.track_kind().await != Some(TrackKind::Video) {
            continue;
        }

        let mut parameters = sender.get_parameters().await;
        if parameters.encodings.is_empty() {
            parameters.encodings.push(EncodingParameters::default());
        }
        parameters.encodings[0].max_bitrate = max_bitrate;

        match sender.set_parameters(parameters).await {
            Ok(()) => match max_bitrate {
                Some(bps) => info!("Video bandwidth limit set to {} bps", bps),
                None => info!("Video bandwidth limit cleared"),
            },
            Err(e) => warn!("Failed to apply video bandwidth limit: {}", e),
        }
    }
}

//! Offer construction and media policy
//!
//! - `build_offer` asks the engine for a local offer
//! - `mangle_for_nack` patches the offer to request audio retransmission
//! - `apply_bandwidth_shaping` caps the video sender once the answer is in

mod bandwidth;
mod sdp;

pub use bandwidth::{apply_bandwidth_shaping, max_bitrate_bps, parse_bandwidth_kbps};
pub use sdp::{mangle_for_nack, media_sections, missing_media, opus_payload_type};

use crate::engine::{PeerConnection, SessionDescription};
use crate::error::EngineError;

/// Request a local offer from the peer-connection engine
pub async fn build_offer(pc: &dyn PeerConnection) -> Result<SessionDescription, EngineError> {
    pc.create_offer().await
}

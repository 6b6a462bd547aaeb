//! WHIP signaling over HTTP

mod whip;

pub use whip::{WhipAnswer, WhipTransport, WHIP_CONTENT_TYPE};

//! Line-level SDP helpers.
//!
//! Only two things are ever read from or written to SDP here, so the text is
//! treated as a list of lines instead of being parsed into a full model.

/// Encoding name, clock rate and channel count of the stereo Opus mapping.
const OPUS_ENCODING: &str = "opus/48000/2";

/// Payload type of the first `a=rtpmap:<pt> opus/48000/2` line.
pub fn opus_payload_type(sdp: &str) -> Option<u8> {
    sdp.lines().find_map(parse_opus_rtpmap)
}

fn parse_opus_rtpmap(line: &str) -> Option<u8> {
    let rest = line.trim_end_matches('\r').strip_prefix("a=rtpmap:")?;
    let (pt, encoding) = rest.split_once(' ')?;
    if !encoding.eq_ignore_ascii_case(OPUS_ENCODING) {
        return None;
    }
    pt.parse().ok()
}

/// Request NACK feedback for the Opus stream of an offer.
///
/// Audio NACK cannot be switched on through the negotiation API, so the offer
/// text is patched: `a=rtcp-fb:<pt> nack` goes directly after the Opus
/// `a=rtpmap` line, reusing that line's terminator. Offers without an Opus
/// mapping, or that already request NACK for Opus (engines that register the
/// feedback themselves), come back unchanged.
pub fn mangle_for_nack(offer_sdp: &str) -> String {
    let lines: Vec<&str> = offer_sdp.split_inclusive('\n').collect();

    let Some((index, pt)) = lines
        .iter()
        .enumerate()
        .find_map(|(i, line)| parse_opus_rtpmap(line.trim_end_matches('\n')).map(|pt| (i, pt)))
    else {
        return offer_sdp.to_string();
    };

    let feedback = format!("a=rtcp-fb:{} nack", pt);

    let already_present = lines
        .iter()
        .any(|line| line.trim_end_matches(['\r', '\n']) == feedback);
    if already_present {
        return offer_sdp.to_string();
    }

    let codec_line = lines[index];
    let ending = &codec_line[codec_line.trim_end_matches(['\r', '\n']).len()..];

    let mut mangled = String::with_capacity(offer_sdp.len() + feedback.len() + 2);
    for line in &lines[..=index] {
        mangled.push_str(line);
    }
    if ending.is_empty() {
        mangled.push_str("\r\n");
    }
    mangled.push_str(&feedback);
    mangled.push_str(ending);
    for line in &lines[index + 1..] {
        mangled.push_str(line);
    }

    mangled
}

/// Media kinds of the `m=` sections, in order.
pub fn media_sections(sdp: &str) -> Vec<&str> {
    sdp.lines()
        .filter_map(|line| line.strip_prefix("m="))
        .filter_map(|rest| rest.split_whitespace().next())
        .collect()
}

/// Offer media sections the answer does not mirror.
///
/// An answer must keep the offer's m-line order, so sections are compared by
/// position. Each entry reads `<index>:<kind>`.
pub fn missing_media(offer_sdp: &str, answer_sdp: &str) -> Vec<String> {
    let offered = media_sections(offer_sdp);
    let answered = media_sections(answer_sdp);

    offered
        .iter()
        .enumerate()
        .filter(|(i, kind)| answered.get(*i) != Some(*kind))
        .map(|(i, kind)| format!("{}:{}", i, kind))
        .collect()
}

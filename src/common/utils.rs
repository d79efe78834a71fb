//! Utility functions for ringcache

use percent_encoding::{percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::time::Duration;

/// Everything but the RFC 3986 unreserved characters is escaped, so URL
/// parsers never rewrite a segment (`\` becomes `/` in http URLs otherwise)
const SEGMENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Encode a key or value for use as one URL path segment
///
/// Values are opaque bytes; non-UTF-8 input is escaped byte by byte.
pub fn encode_segment(segment: &[u8]) -> String {
    percent_encode(segment, SEGMENT_ENCODE_SET).to_string()
}

/// Base URL of a peer; addresses without a scheme are reached over http
pub fn peer_base_url(addr: &str) -> String {
    let addr = addr.trim_end_matches('/');
    if addr.contains("://") {
        addr.to_string()
    } else {
        format!("http://{}", addr)
    }
}

/// `{peer}{base_path}/{segment}/{segment}...`
pub fn peer_url(addr: &str, base_path: &str, segments: &[&[u8]]) -> String {
    let mut url = peer_base_url(addr);
    url.push_str(base_path);
    for segment in segments {
        url.push('/');
        url.push_str(&encode_segment(segment));
    }
    url
}

/// Address to bind for a listen address; ":8080" listens on every interface
pub fn bind_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}

/// Parse duration string (e.g., "500ms", "30s", "5m", "1h")
pub fn parse_duration(s: &str) -> crate::Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(crate::Error::InvalidConfig("empty duration".into()));
    }

    let (num_str, unit) = if let Some(num) = s.strip_suffix("ms") {
        (num, "ms")
    } else {
        let split = s.len() - s.chars().last().map_or(0, char::len_utf8);
        (&s[..split], &s[split..])
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| crate::Error::InvalidConfig(format!("invalid duration: {}", s)))?;

    let duration = match unit {
        "ms" => Duration::from_millis(num),
        "s" => Duration::from_secs(num),
        "m" => Duration::from_secs(num * 60),
        "h" => Duration::from_secs(num * 3600),
        _ => {
            return Err(crate::Error::InvalidConfig(format!(
                "unknown duration unit: {}",
                unit
            )))
        }
    };

    Ok(duration)
}

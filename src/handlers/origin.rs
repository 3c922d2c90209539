//! Origin checks for the WebSocket handshake

use log::warn;
use url::Url;

/// Validate an Origin header against the configured allow-list.
///
/// A missing Origin is always rejected. With an empty allow-list, local
/// origins are accepted only in development mode.
pub fn validate_origin(origin: Option<&str>, allowed_origins: &[String], development_mode: bool) -> bool {
    let origin_value = match origin {
        Some(value) => value,
        None => {
            warn!("WebSocket connection rejected: Missing Origin header");
            return false;
        }
    };

    let normalized = origin_value.trim_end_matches('/');
    if allowed_origins
        .iter()
        .any(|allowed| allowed.trim_end_matches('/') == normalized)
    {
        return true;
    }

    if development_mode && allowed_origins.is_empty() {
        if is_local_origin(origin_value) {
            warn!("Development mode: allowing local origin: {}", origin_value);
            return true;
        }
    }

    warn!("Origin rejected: {} (not in allowed list)", origin_value);
    false
}

fn is_local_origin(origin: &str) -> bool {
    let url = match Url::parse(origin) {
        Ok(url) => url,
        Err(_) => return false,
    };

    matches!(url.scheme(), "http" | "https")
        && matches!(url.host_str(), Some("localhost") | Some("127.0.0.1") | Some("[::1]"))
}

//! Client IP resolution for WebSocket connections
//!
//! The resolved address becomes the IP half of a sender's identity, which
//! mutes can match on. Proxy headers are only honoured when the deployment
//! says a proxy sits in front of the server; otherwise any client could pick
//! an arbitrary address and dodge an IP mute.

use log::{debug, warn};
use std::net::{IpAddr, SocketAddr};
use warp::hyper::HeaderMap;

/// Configuration for IP extraction behavior
#[derive(Debug, Clone, Default)]
pub struct IpExtractionConfig {
    /// Whether to trust CF-Connecting-IP / X-Forwarded-For
    pub trust_proxy_headers: bool,
}

impl IpExtractionConfig {
    pub fn behind_proxy() -> Self {
        Self {
            trust_proxy_headers: true,
        }
    }
}

/// Resolve the client IP from headers and the socket peer address
pub fn extract_client_ip(
    headers: &HeaderMap,
    remote_addr: Option<SocketAddr>,
    config: &IpExtractionConfig,
) -> Option<IpAddr> {
    if config.trust_proxy_headers {
        // Cloudflare sets a single authoritative client address
        if let Some(ip) = header_ip(headers, "cf-connecting-ip", |v| Some(v)) {
            debug!("Extracted IP from CF-Connecting-IP: {}", ip);
            return Some(ip);
        }

        // X-Forwarded-For: "client, proxy1, proxy2"; the leftmost is the client
        if let Some(ip) = header_ip(headers, "x-forwarded-for", |v| v.split(',').next()) {
            debug!("Extracted IP from X-Forwarded-For: {}", ip);
            return Some(ip);
        }
    }

    match remote_addr {
        Some(addr) => Some(normalize_ip(addr.ip())),
        None => {
            warn!("No client IP available for connection");
            None
        }
    }
}

fn header_ip<'a, F>(headers: &'a HeaderMap, name: &str, pick: F) -> Option<IpAddr>
where
    F: FnOnce(&'a str) -> Option<&'a str>,
{
    let value = headers.get(name)?.to_str().ok()?;
    let candidate = pick(value)?.trim();
    match candidate.trim_matches(|c| c == '[' || c == ']').parse::<IpAddr>() {
        Ok(ip) => Some(normalize_ip(ip)),
        Err(_) => {
            warn!("Invalid IP format in {} header: {}", name, candidate);
            None
        }
    }
}

/// Unwrap IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`)
pub fn normalize_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        },
        v4 => v4,
    }
}

//! Server configuration module
//! Handles dynamic configuration parameters for the live chat server

use crate::constants::{
    DEFAULT_HISTORY_LENGTH, DEFAULT_HOST, DEFAULT_MAX_FRAME_BYTES, DEFAULT_MAX_MESSAGE_LENGTH,
    DEFAULT_PORT, MAX_HISTORY_LENGTH,
};
use crate::error::{LiveChatError, Result};
use std::env;
use std::str::FromStr;

/// Server configuration parameters
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Number of recent messages kept per room for new joiners
    pub history_length: usize,
    /// Maximum chat text length in characters
    pub max_message_length: usize,
    /// Maximum size of an inbound websocket text frame
    pub max_frame_bytes: usize,
    /// Origins allowed to open a websocket
    pub allowed_origins: Vec<String>,
    /// Development mode (admits localhost origins when no allow-list is set)
    pub development_mode: bool,
    /// Honour proxy headers when resolving the sender IP
    pub trust_proxy_headers: bool,
    /// Optional JSON document seeding the in-memory stores
    pub seed_file: Option<String>,
    /// TLS configuration
    pub enable_tls: bool,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
}

impl ServerConfig {
    /// Permissive configuration for tests
    pub fn for_testing() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            history_length: DEFAULT_HISTORY_LENGTH,
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            allowed_origins: Vec::new(),
            development_mode: true,
            trust_proxy_headers: false,
            seed_file: None,
            enable_tls: false,
            tls_cert_path: None,
            tls_key_path: None,
        }
    }

    /// Load configuration from environment variables if available
    pub fn from_env() -> Result<Self> {
        let host = env::var("LIVECHAT_HOST").unwrap_or(DEFAULT_HOST.to_string());
        let port = parse_var("LIVECHAT_PORT", DEFAULT_PORT)?;

        let history_length = parse_var("LIVECHAT_HISTORY_LENGTH", DEFAULT_HISTORY_LENGTH)?;
        if history_length == 0 || history_length > MAX_HISTORY_LENGTH {
            return Err(LiveChatError::ConfigError(format!(
                "LIVECHAT_HISTORY_LENGTH must be between 1 and {}, got {}",
                MAX_HISTORY_LENGTH, history_length
            )));
        }

        let max_message_length =
            parse_var("LIVECHAT_MAX_MESSAGE_LENGTH", DEFAULT_MAX_MESSAGE_LENGTH)?;
        let max_frame_bytes = parse_var("LIVECHAT_MAX_FRAME_BYTES", DEFAULT_MAX_FRAME_BYTES)?;

        let allowed_origins = env::var("CORS_ALLOW_ORIGINS")
            .map(|raw| parse_origins(&raw))
            .unwrap_or_default();

        let development_mode = flag_var("LIVECHAT_DEVELOPMENT_MODE");
        let trust_proxy_headers = flag_var("LIVECHAT_TRUST_PROXY_HEADERS");
        let seed_file = env::var("LIVECHAT_SEED_FILE").ok().filter(|p| !p.is_empty());

        // TLS configuration
        let enable_tls = flag_var("LIVECHAT_ENABLE_TLS");
        let tls_cert_path = env::var("LIVECHAT_TLS_CERT_PATH").ok();
        let tls_key_path = env::var("LIVECHAT_TLS_KEY_PATH").ok();

        if enable_tls {
            match (&tls_cert_path, &tls_key_path) {
                (Some(cert_path), Some(key_path)) => {
                    for path in [cert_path, key_path] {
                        if !std::path::Path::new(path).exists() {
                            return Err(LiveChatError::ConfigError(format!(
                                "TLS file does not exist: {}",
                                path
                            )));
                        }
                    }
                }
                _ => {
                    return Err(LiveChatError::ConfigError(
                        "TLS is enabled but LIVECHAT_TLS_CERT_PATH or LIVECHAT_TLS_KEY_PATH is not set"
                            .to_string(),
                    ))
                }
            }
        }

        Ok(Self {
            host,
            port,
            history_length,
            max_message_length,
            max_frame_bytes,
            allowed_origins,
            development_mode,
            trust_proxy_headers,
            seed_file,
            enable_tls,
            tls_cert_path,
            tls_key_path,
        })
    }
}

/// Split a comma-separated origin list, dropping blanks
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .map(|origin| origin.to_string())
        .collect()
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            LiveChatError::ConfigError(format!("{} has an invalid value: {}", name, raw))
        }),
        Err(_) => Ok(default),
    }
}

fn flag_var(name: &str) -> bool {
    env::var(name)
        .map(|v| v.to_lowercase() == "true" || v == "1")
        .unwrap_or(false)
}

use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;

use rusty_livechat::config::ServerConfig;
use rusty_livechat::core::server::ChatServer;
use rusty_livechat::handlers;
use rusty_livechat::storage::memory::{MemoryStore, SeedData};

#[tokio::main]
async fn main() {
    // Initialize env
    let env_loaded = dotenvy::dotenv();

    // Initialize logging
    env_logger::init();

    match env_loaded {
        Ok(path) => info!("Environment variables loaded from {}", path.display()),
        Err(e) => warn!("Failed to load .env file: {}", e),
    }

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Configuration: host={}, port={}, history_length={}, origins={:?}",
        config.host, config.port, config.history_length, config.allowed_origins
    );
    if config.development_mode {
        warn!("Development mode is enabled; local origins are accepted");
    }

    let store = match &config.seed_file {
        Some(path) => match SeedData::from_file(path) {
            Ok(seed) => {
                info!(
                    "Seeded {} rooms, {} banned words and {} mutes from {}",
                    seed.rooms.len(),
                    seed.banned_words.len(),
                    seed.mutes.len(),
                    path
                );
                MemoryStore::from_seed(seed)
            }
            Err(e) => {
                error!("Failed to load seed file {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => {
            warn!("No seed file configured; starting with no rooms");
            MemoryStore::new()
        }
    };

    let server = match ChatServer::builder()
        .history_length(config.history_length)
        .max_message_length(config.max_message_length)
        .memory_store(Arc::new(store))
        .build()
    {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to build chat server: {}", e);
            std::process::exit(1);
        }
    };

    let routes = handlers::routes(server, &config);

    // Build the server address
    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to parse server address: {}", e);
            std::process::exit(1);
        }
    };

    if config.enable_tls {
        let (cert_path, key_path) = match (&config.tls_cert_path, &config.tls_key_path) {
            (Some(cert), Some(key)) => (cert.clone(), key.clone()),
            _ => {
                error!("TLS enabled but certificate or key path is missing");
                std::process::exit(1);
            }
        };

        info!("Starting Rusty Livechat server on wss://{}", addr);
        warp::serve(routes)
            .tls()
            .cert_path(cert_path)
            .key_path(key_path)
            .run(addr)
            .await;
    } else {
        info!("Starting Rusty Livechat server on ws://{}", addr);
        warp::serve(routes).run(addr).await;
    }
}

//! Request handlers for different server endpoints

pub mod origin;
pub mod websocket;

use log::info;
use std::convert::Infallible;
use std::net::SocketAddr;
use warp::http::StatusCode;
use warp::hyper::HeaderMap;
use warp::{Filter, Rejection, Reply};

use crate::config::ServerConfig;
use crate::constants::WS_PATH;
use crate::core::ip_extractor::{extract_client_ip, IpExtractionConfig};
use crate::core::server::SharedChatServer;
use crate::error::LiveChatError;

pub use origin::validate_origin;
pub use websocket::handle_ws_client;

/// Build the `/ws` and `/health` routes
pub fn routes(
    server: SharedChatServer,
    config: &ServerConfig,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let allowed_origins = config.allowed_origins.clone();
    let development_mode = config.development_mode;
    let ip_config = IpExtractionConfig {
        trust_proxy_headers: config.trust_proxy_headers,
    };
    let max_frame_bytes = config.max_frame_bytes;

    let ws_route = warp::path(WS_PATH)
        .and(warp::path::end())
        .and(warp::ws())
        .and(warp::header::optional::<String>("origin"))
        .and(warp::header::headers_cloned())
        .and(warp::addr::remote())
        .and(with_server(server))
        .map(
            move |ws: warp::ws::Ws,
                  origin: Option<String>,
                  headers: HeaderMap,
                  remote_addr: Option<SocketAddr>,
                  server: SharedChatServer| {
                if !validate_origin(origin.as_deref(), &allowed_origins, development_mode) {
                    return forbidden(LiveChatError::Forbidden).into_response();
                }

                let client_ip = extract_client_ip(&headers, remote_addr, &ip_config);
                info!("New websocket connection from {:?}", client_ip);

                // Frames over the limit still arrive so the client gets an error
                // event; only grossly oversized ones are cut off by the protocol
                ws.max_message_size(max_frame_bytes.saturating_mul(4))
                    .on_upgrade(move |socket| {
                        handle_ws_client(socket, server, client_ip, max_frame_bytes)
                    })
                    .into_response()
            },
        );

    let health_route = warp::path("health").and(warp::path::end()).map(|| "OK");

    ws_route.or(health_route)
}

// Refused handshake: status plus the error text
fn forbidden(err: LiveChatError) -> impl Reply {
    warp::reply::with_status(err.to_string(), StatusCode::FORBIDDEN)
}

// Include the shared chat server in request handling
fn with_server(
    server: SharedChatServer,
) -> impl Filter<Extract = (SharedChatServer,), Error = Infallible> + Clone {
    warp::any().map(move || server.clone())
}

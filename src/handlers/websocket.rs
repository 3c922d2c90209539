use futures_util::sink::SinkExt;
use futures_util::stream::StreamExt;
use log::{debug, error, info, warn};
use std::net::IpAddr;
use tokio::sync::mpsc;
use warp::ws::WebSocket;

use crate::core::connection::Connection;
use crate::core::message_handler::MessageHandler;
use crate::core::server::SharedChatServer;

// Handle a WebSocket connection
pub async fn handle_ws_client(
    ws: WebSocket,
    server: SharedChatServer,
    client_ip: Option<IpAddr>,
    max_frame_bytes: usize,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (tx, rx) = mpsc::unbounded_channel();

    // Spawn a task to forward messages from our channel to the WebSocket
    tokio::task::spawn(async move {
        let mut rx = rx;
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_tx.send(message).await {
                debug!("Failed to send WebSocket message: {}", e);
                break;
            }
        }
    });

    let connection = Connection::new(tx, client_ip);
    let client_id = connection.id.clone();
    server.connect(connection.clone());

    let handler = MessageHandler::with_frame_limit(server.clone(), max_frame_bytes);

    // Events from one connection are handled strictly in arrival order
    while let Some(result) = ws_rx.next().await {
        match result {
            Ok(msg) => {
                if msg.is_close() {
                    break;
                }
                if !msg.is_text() {
                    continue;
                }
                let text = match msg.to_str() {
                    Ok(s) => s,
                    Err(_) => {
                        warn!("Failed to extract text from message from {}", client_id);
                        continue;
                    }
                };
                // Errors were already reported to the client
                let _ = handler.handle_client_message(&client_id, text).await;
            }
            Err(e) => {
                error!("WebSocket error for {}: {}", client_id, e);
                break;
            }
        }
    }

    server.disconnect(&client_id);
    info!(
        "Connection {} closed after {:?}",
        client_id,
        connection.connection_duration()
    );
}

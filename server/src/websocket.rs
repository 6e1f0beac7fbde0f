//! WebSocket gateway: socket lifecycle and the bridge into the ingress
//! queue.
//!
//! Each accepted socket gets a connection handle, announces itself to the
//! dispatcher, and then only ever parses frames and pushes them onto the
//! ingress queue — all signaling state lives behind the dispatcher.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use parley_protocol::Envelope;

use crate::clients::OUTBOUND_BUFFER;
use crate::config::ServerConfig;
use crate::ingress::Ingress;
use crate::stats::ServerStats;

/// State shared across connections
pub struct ServerState {
    pub config: ServerConfig,
    pub ingress: Ingress,
    pub stats: Arc<ServerStats>,
    next_conn: AtomicU64,
}

impl ServerState {
    pub fn new(config: ServerConfig, ingress: Ingress, stats: Arc<ServerStats>) -> Self {
        Self {
            config,
            ingress,
            stats,
            next_conn: AtomicU64::new(1),
        }
    }
}

/// Handle WebSocket upgrade
pub async fn handle_websocket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    let conn = state.next_conn.fetch_add(1, Ordering::Relaxed);
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);

    info!("New WebSocket connection {}", conn);
    state.ingress.connected(conn, tx).await;

    // Forward outbound frames and send periodic pings. When the dispatcher
    // drops the sender (removal, or a refused accept) the channel closes and
    // we ask the peer to go away.
    let ping_interval = state.config.ws_ping_interval;
    let forward_task = tokio::spawn(async move {
        let mut ping_ticker =
            tokio::time::interval(std::time::Duration::from_secs(ping_interval));
        ping_ticker.tick().await; // skip the first immediate tick

        loop {
            tokio::select! {
                frame = rx.recv() => match frame {
                    Some(text) => {
                        if ws_sender.send(Message::Text(text)).await.is_err() {
                            return;
                        }
                    }
                    None => break,
                },
                _ = ping_ticker.tick() => {
                    if ws_sender.send(Message::Ping(Vec::new())).await.is_err() {
                        return;
                    }
                }
            }
        }
        let _ = ws_sender.send(Message::Close(None)).await;
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if text.len() > state.config.max_message_size {
                    warn!(
                        "Connection {} sent an oversized frame ({} bytes), dropping",
                        conn,
                        text.len()
                    );
                    state.stats.total_errors.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                match Envelope::parse(&text) {
                    Ok(envelope) => {
                        state.ingress.push_frame(conn, envelope);
                    }
                    Err(e) => {
                        warn!("Connection {} sent an unparseable frame: {}", conn, e);
                        state.stats.total_errors.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {} // pings and pongs are handled by the protocol layer
            Err(e) => {
                debug!("WebSocket error on connection {}: {}", conn, e);
                break;
            }
        }
    }

    state.ingress.closed(conn).await;
    forward_task.abort();
    debug!("Connection {} closed", conn);
}

//! End-to-end gateway tests over a real TCP socket.
//!
//! Boots the full stack (router, gateway, ingress, dispatcher) on an
//! ephemeral port and talks to it with a plain WebSocket client.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use parley_server::config::ServerConfig;
use parley_server::dispatcher::Dispatcher;
use parley_server::ingress::Ingress;
use parley_server::routing::create_router;
use parley_server::stats::ServerStats;
use parley_server::websocket::ServerState;

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Boot a server on an ephemeral port; the watch sender keeps the
/// dispatcher alive for the duration of the test.
async fn spawn_server() -> (String, watch::Sender<bool>) {
    let config = ServerConfig::default();
    let stats = Arc::new(ServerStats::new());
    let (ingress, events) = Ingress::channel(config.queue_capacity, stats.clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let dispatcher = Dispatcher::new(&config, stats.clone());
    tokio::spawn(dispatcher.run(events, shutdown_rx));

    let state = Arc::new(ServerState::new(config, ingress, stats));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve failed");
    });

    (format!("ws://{}/ws", addr), shutdown_tx)
}

async fn connect(url: &str) -> WsClient {
    let (socket, _) = connect_async(url).await.expect("Failed to connect");
    socket
}

async fn send_json(ws: &mut WsClient, value: Value) {
    ws.send(Message::Text(value.to_string()))
        .await
        .expect("Failed to send frame");
}

/// Next text frame as JSON, skipping protocol-level ping/pong
async fn recv_json(ws: &mut WsClient) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("Timed out waiting for a frame")
            .expect("Stream ended unexpectedly")
            .expect("WebSocket error");
        match msg {
            Message::Text(text) => {
                return serde_json::from_str(&text).expect("Frame should be JSON")
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Unexpected frame: {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_full_signaling_flow() {
    let (url, _shutdown) = spawn_server().await;

    // A connects and is identified
    let mut ws_a = connect(&url).await;
    let hello_a = recv_json(&mut ws_a).await;
    assert_eq!(hello_a["event"], "client-id");
    let id_a = hello_a["data"]["clientId"].as_str().unwrap().to_owned();
    assert_eq!(id_a.len(), 36);

    // A creates a room
    send_json(&mut ws_a, json!({ "event": "join-room", "data": { "roomName": "demo" } })).await;
    let created = recv_json(&mut ws_a).await;
    assert_eq!(created["event"], "room-created");
    assert_eq!(created["data"]["roomName"], "demo");
    let room_id = created["data"]["roomId"].as_str().unwrap().to_owned();

    let list = recv_json(&mut ws_a).await;
    assert_eq!(list["event"], "participants");
    assert_eq!(list["data"]["participants"], json!([id_a]));

    // B joins by id
    let mut ws_b = connect(&url).await;
    let hello_b = recv_json(&mut ws_b).await;
    let id_b = hello_b["data"]["clientId"].as_str().unwrap().to_owned();

    send_json(&mut ws_b, json!({ "event": "join-room", "data": { "roomId": room_id } })).await;
    let list_a = recv_json(&mut ws_a).await;
    let list_b = recv_json(&mut ws_b).await;
    assert_eq!(list_a["data"]["participants"], json!([id_a, id_b]));
    assert_eq!(list_b["data"]["participants"], json!([id_a, id_b]));

    // A's offer reaches only B, stamped with the sender id
    let sdp = json!({ "type": "offer", "sdp": "v=0\r\no=- 42 2 IN IP4 127.0.0.1\r\n" });
    send_json(
        &mut ws_a,
        json!({ "event": "offer", "data": { "targetClientId": id_b, "offer": sdp } }),
    )
    .await;
    let offer = recv_json(&mut ws_b).await;
    assert_eq!(offer["event"], "offer");
    assert_eq!(offer["data"]["fromClientId"], json!(id_a));
    assert_eq!(offer["data"]["offer"], sdp);

    // B answers back
    send_json(
        &mut ws_b,
        json!({ "event": "answer", "data": { "targetClientId": id_a, "answer": { "sdp": "v=0" } } }),
    )
    .await;
    let answer = recv_json(&mut ws_a).await;
    assert_eq!(answer["event"], "answer");
    assert_eq!(answer["data"]["fromClientId"], json!(id_b));

    // A hangs up; B learns it is alone
    ws_a.close(None).await.expect("Failed to close");
    let list = recv_json(&mut ws_b).await;
    assert_eq!(list["event"], "participants");
    assert_eq!(list["data"]["participants"], json!([id_b]));
}

#[tokio::test]
async fn test_malformed_frame_does_not_kill_the_connection() {
    let (url, _shutdown) = spawn_server().await;

    let mut ws = connect(&url).await;
    let hello = recv_json(&mut ws).await;
    assert_eq!(hello["event"], "client-id");

    // Garbage is dropped server-side without an error reply
    ws.send(Message::Text("not json at all".to_string()))
        .await
        .expect("Failed to send frame");

    // The connection is still healthy afterwards
    send_json(&mut ws, json!({ "event": "join-room", "data": { "roomName": "still-here" } })).await;
    let created = recv_json(&mut ws).await;
    assert_eq!(created["event"], "room-created");
    assert_eq!(created["data"]["roomName"], "still-here");
}

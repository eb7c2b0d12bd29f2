//! Integration tests for message routing: src stamping, per-destination
//! ordering, offline buffering with ring eviction, LEAVE semantics, and
//! expiry notices for undeliverable buffered messages.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use rendezvous_server::cleanup;
use rendezvous_server::config::Config;
use rendezvous_server::routes;
use rendezvous_server::state::AppState;

type WsClient =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Helper: start the server on a random port and return its address.
async fn start_test_server(config: Config) -> SocketAddr {
    let state = AppState::new(config);
    cleanup::spawn_liveness_sweep(state.realm.clone(), &state.config);
    cleanup::spawn_queue_sweep(state.realm.clone(), &state.config);

    let app = routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

/// Connect and consume the OPEN acknowledgment.
async fn connect_open(addr: SocketAddr, id: &str) -> WsClient {
    let url = format!("ws://{addr}/peerjs?key=peerjs&id={id}&token=t-{id}");
    let (mut ws, _) = tokio_tungstenite::connect_async(url)
        .await
        .expect("Failed to connect to WebSocket");
    let open = next_envelope(&mut ws).await;
    assert_eq!(open["type"], "OPEN");
    ws
}

async fn next_envelope(ws: &mut WsClient) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("Timed out waiting for frame")
            .expect("Stream ended while waiting for frame")
            .expect("Socket error while waiting for frame");
        match msg {
            Message::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("Valid JSON envelope")
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Expected text frame, got: {other:?}"),
        }
    }
}

async fn send_json(ws: &mut WsClient, value: Value) {
    ws.send(Message::text(value.to_string()))
        .await
        .expect("Failed to send frame");
}

#[tokio::test]
async fn offers_are_relayed_with_the_authenticated_src() {
    let addr = start_test_server(Config::default()).await;
    let mut alpha = connect_open(addr, "alpha").await;
    let mut beta = connect_open(addr, "beta").await;

    // the spoofed src must be replaced with the sender's registered id
    send_json(
        &mut alpha,
        json!({ "type": "OFFER", "src": "mallory", "dst": "beta", "payload": { "sdp": "v=0" } }),
    )
    .await;

    let relayed = next_envelope(&mut beta).await;
    assert_eq!(relayed["type"], "OFFER");
    assert_eq!(relayed["src"], "alpha");
    assert_eq!(relayed["dst"], "beta");
    assert_eq!(relayed["payload"]["sdp"], "v=0");
}

#[tokio::test]
async fn candidates_preserve_arrival_order_per_destination() {
    let addr = start_test_server(Config::default()).await;
    let mut alpha = connect_open(addr, "alpha").await;
    let mut beta = connect_open(addr, "beta").await;

    for seq in 0..5 {
        send_json(
            &mut alpha,
            json!({ "type": "CANDIDATE", "dst": "beta", "payload": { "seq": seq } }),
        )
        .await;
    }

    for seq in 0..5 {
        let relayed = next_envelope(&mut beta).await;
        assert_eq!(relayed["type"], "CANDIDATE");
        assert_eq!(relayed["payload"]["seq"], seq);
    }
}

#[tokio::test]
async fn malformed_frames_are_dropped_without_closing() {
    let addr = start_test_server(Config::default()).await;
    let mut alpha = connect_open(addr, "alpha").await;
    let mut beta = connect_open(addr, "beta").await;

    send_json(&mut alpha, json!({ "not": "an envelope" })).await;
    alpha
        .send(Message::text("this is not json".to_string()))
        .await
        .expect("send");
    // a relay type without a dst is dropped too
    send_json(&mut alpha, json!({ "type": "OFFER", "payload": {} })).await;

    // the connection survives and still relays
    send_json(
        &mut alpha,
        json!({ "type": "ANSWER", "dst": "beta", "payload": { "sdp": "v=0" } }),
    )
    .await;
    let relayed = next_envelope(&mut beta).await;
    assert_eq!(relayed["type"], "ANSWER");
    assert_eq!(relayed["src"], "alpha");
}

#[tokio::test]
async fn messages_to_an_offline_peer_are_buffered_in_order() {
    let config = Config {
        expire_timeout: 60_000,
        ..Default::default()
    };
    let addr = start_test_server(config).await;
    let mut alpha = connect_open(addr, "alpha").await;

    for seq in 0..3 {
        send_json(
            &mut alpha,
            json!({ "type": "OFFER", "dst": "beta", "payload": { "seq": seq } }),
        )
        .await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    // beta connects: OPEN first, then the backlog in insertion order
    let mut beta = connect_open(addr, "beta").await;
    for seq in 0..3 {
        let buffered = next_envelope(&mut beta).await;
        assert_eq!(buffered["type"], "OFFER");
        assert_eq!(buffered["src"], "alpha");
        assert_eq!(buffered["payload"]["seq"], seq);
    }
}

#[tokio::test]
async fn offline_buffer_drops_oldest_when_full() {
    let config = Config {
        cleanup_out_msgs: 2,
        expire_timeout: 60_000,
        ..Default::default()
    };
    let addr = start_test_server(config).await;
    let mut alpha = connect_open(addr, "alpha").await;

    for seq in 0..4 {
        send_json(
            &mut alpha,
            json!({ "type": "OFFER", "dst": "beta", "payload": { "seq": seq } }),
        )
        .await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut beta = connect_open(addr, "beta").await;
    // only the two newest survived the ring bound
    assert_eq!(next_envelope(&mut beta).await["payload"]["seq"], 2);
    assert_eq!(next_envelope(&mut beta).await["payload"]["seq"], 3);
}

#[tokio::test]
async fn leave_is_relayed_and_disconnects_the_sender() {
    let addr = start_test_server(Config::default()).await;
    let mut alpha = connect_open(addr, "alpha").await;
    let mut beta = connect_open(addr, "beta").await;

    send_json(&mut alpha, json!({ "type": "LEAVE", "dst": "beta" })).await;

    let relayed = next_envelope(&mut beta).await;
    assert_eq!(relayed["type"], "LEAVE");
    assert_eq!(relayed["src"], "alpha");

    tokio::time::sleep(Duration::from_millis(200)).await;

    // alpha's registration is gone: a fresh connection under the same id is
    // admitted even though override is disabled
    let mut alpha_again = connect_open(addr, "alpha").await;
    send_json(
        &mut alpha_again,
        json!({ "type": "OFFER", "dst": "beta", "payload": {} }),
    )
    .await;
    assert_eq!(next_envelope(&mut beta).await["type"], "OFFER");
}

#[tokio::test]
async fn expired_buffered_messages_notify_the_sender() {
    let config = Config {
        expire_timeout: 200,
        sweep_interval: 50,
        ..Default::default()
    };
    let addr = start_test_server(config).await;
    let mut alpha = connect_open(addr, "alpha").await;

    send_json(
        &mut alpha,
        json!({ "type": "OFFER", "dst": "ghost", "payload": { "sdp": "v=0" } }),
    )
    .await;

    // the retention window lapses with ghost never connecting
    let notice = next_envelope(&mut alpha).await;
    assert_eq!(notice["type"], "EXPIRE");
    assert_eq!(notice["src"], "ghost");
    assert_eq!(notice["dst"], "alpha");
}

#[tokio::test]
async fn override_redirects_subsequent_traffic_to_the_new_holder() {
    let config = Config {
        allow_override_connection: true,
        ..Default::default()
    };
    let addr = start_test_server(config).await;
    let mut alpha = connect_open(addr, "alpha").await;
    let mut beta_old = connect_open(addr, "beta").await;

    send_json(
        &mut alpha,
        json!({ "type": "OFFER", "dst": "beta", "payload": { "seq": 0 } }),
    )
    .await;
    assert_eq!(next_envelope(&mut beta_old).await["payload"]["seq"], 0);

    // a second connection claims the id; the old holder is closed and the
    // relay follows the replacement
    let mut beta_new = connect_open(addr, "beta").await;
    send_json(
        &mut alpha,
        json!({ "type": "OFFER", "dst": "beta", "payload": { "seq": 1 } }),
    )
    .await;
    assert_eq!(next_envelope(&mut beta_new).await["payload"]["seq"], 1);
}

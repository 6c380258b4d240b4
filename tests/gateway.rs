//! Integration tests driving the router in-process via `axum_test`'s `ws`
//! feature, the same harness `oprf-service/tests/oprf_service_test_suite.rs`
//! uses against its own router, plus one real-socket test using
//! `tokio-tungstenite`, grounded on `oprf-client`/`oprf-test`'s use of that
//! same crate to drive a live server instead of an in-process router.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum_test::TestServer;
use clap::Parser;
use futures::{SinkExt, StreamExt};
use onebot_forward_ws::config::ServiceConfig;
use onebot_forward_ws::service::{router, AppState};
use onebot_forward_ws::GatewayService;
use serde_json::Value;

fn config(access_token: &str) -> ServiceConfig {
    ServiceConfig::try_parse_from([
        "gateway",
        "--bot-uin",
        "10001",
        "--access-token",
        access_token,
        "--heartbeat-interval-ms",
        "50",
    ])
    .expect("valid test config")
}

fn test_server(cfg: ServiceConfig) -> TestServer {
    let on_message: onebot_forward_ws::OnMessageReceived = Arc::new(|_id, _msg| {});
    let state = AppState::new(Arc::new(cfg), on_message);
    TestServer::builder()
        .http_transport()
        .build(router(state))
        .expect("can build test server")
}

#[tokio::test]
async fn auth_accept_sends_lifecycle_then_heartbeat() {
    let server = test_server(config("k"));

    let mut ws = server
        .get_websocket("/universal")
        .authorization_bearer("k")
        .await
        .into_websocket()
        .await;

    let lifecycle: Value = ws.receive_json().await;
    assert_eq!(lifecycle["meta_event_type"], "lifecycle");
    assert_eq!(lifecycle["sub_type"], "connect");
    assert_eq!(lifecycle["self_id"], 10001);

    let heartbeat: Value = tokio::time::timeout(Duration::from_millis(500), ws.receive_json())
        .await
        .expect("a heartbeat frame within the timeout");
    assert_eq!(heartbeat["status"]["online"], true);
    assert_eq!(heartbeat["status"]["good"], true);
}

#[tokio::test]
async fn auth_reject_via_query_gets_403_and_no_upgrade() {
    let server = test_server(config("k"));

    server
        .get_websocket("/universal?access_token=wrong")
        .await
        .assert_status_forbidden();
}

#[tokio::test]
async fn api_session_receives_no_heartbeat_or_broadcast() {
    let server = test_server(config(""));

    let mut api_ws = server.get_websocket("/api").await.into_websocket().await;
    let mut event_ws = server.get_websocket("/event").await.into_websocket().await;

    // the event session gets its lifecycle frame
    let lifecycle: Value = event_ws.receive_json().await;
    assert_eq!(lifecycle["meta_event_type"], "lifecycle");

    // the api session must never receive anything unsolicited
    let nothing_yet = tokio::time::timeout(Duration::from_millis(150), api_ws.receive_json::<Value>()).await;
    assert!(nothing_yet.is_err(), "api session must not receive lifecycle/heartbeat frames");
}

#[tokio::test]
async fn shutdown_drains_live_sessions() {
    let cfg = config("");
    let on_message: onebot_forward_ws::OnMessageReceived = Arc::new(|_id, _msg| {});
    let state = AppState::new(Arc::new(cfg), on_message);
    let registry = state.registry().clone();
    let server = TestServer::builder()
        .http_transport()
        .build(router(state.clone()))
        .expect("can build test server");

    let _first = server.get_websocket("/universal").await.into_websocket().await;
    let _second = server.get_websocket("/event").await.into_websocket().await;

    // allow the upgrade handlers to register both sessions
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(registry.len(), 2);

    state.root_cancellation_token().cancel();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(registry.is_empty(), "cancelling the root token must drain every session");
}

#[tokio::test]
async fn large_message_is_delivered_whole_to_the_receive_hook() {
    // spec.md §4.3/§8 "Frame integrity": the bytes published to
    // `OnMessageReceived` must equal the full concatenated message. axum's
    // `Message::Text` already hands up a defragmented `Utf8Bytes` per
    // logical message (see session_task.rs), so a 3 KiB message exercises
    // the same contract a literal multi-fragment send would — the published
    // string must be the whole 3 KiB, not a truncated first chunk.
    let received: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&received);
    let on_message: onebot_forward_ws::OnMessageReceived =
        Arc::new(move |_id, msg| captured.lock().unwrap().push(msg));
    let state = AppState::new(Arc::new(config("")), on_message);
    let server = TestServer::builder()
        .http_transport()
        .build(router(state))
        .expect("can build test server");

    let mut ws = server.get_websocket("/universal").await.into_websocket().await;

    let big = "x".repeat(3 * 1024);
    ws.send_text(big.clone()).await;

    tokio::time::timeout(Duration::from_millis(500), async {
        loop {
            if !received.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("message delivered within the timeout");

    let got = received.lock().unwrap().clone();
    assert_eq!(got.len(), 1, "exactly one OnMessageReceived invocation per message");
    assert_eq!(got[0].len(), big.len());
    assert_eq!(got[0], big);
}

#[tokio::test]
async fn heartbeat_count_stays_within_drift_bound() {
    // spec.md §8 "Drift bound": for a session alive for duration T, the
    // number of heartbeats emitted is in floor(T/interval) +- 1.
    let server = test_server(config(""));
    let mut ws = server.get_websocket("/universal").await.into_websocket().await;

    let _lifecycle: Value = ws.receive_json().await;

    let interval_ms = 50u64;
    let alive_ms = 530u64; // floor(530/50) == 10
    let expected = alive_ms / interval_ms;

    let mut count = 0u64;
    let deadline = tokio::time::Instant::now() + Duration::from_millis(alive_ms);
    while tokio::time::Instant::now() < deadline {
        match tokio::time::timeout_at(deadline, ws.receive_json::<Value>()).await {
            Ok(_) => count += 1,
            Err(_) => break,
        }
    }

    let lower = expected.saturating_sub(1);
    let upper = expected + 1;
    assert!(
        (lower..=upper).contains(&count),
        "expected {count} heartbeats to be within [{lower}, {upper}] of {expected}"
    );
}

#[tokio::test]
async fn client_sent_close_frame_disconnects_event_session() {
    let state_messages: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&state_messages);
    let on_message: onebot_forward_ws::OnMessageReceived =
        Arc::new(move |_id, msg| captured.lock().unwrap().push(msg));
    let state = AppState::new(Arc::new(config("")), on_message);
    let registry = state.registry().clone();
    let server = TestServer::builder()
        .http_transport()
        .build(router(state))
        .expect("can build test server");

    let mut ws = server.get_websocket("/event").await.into_websocket().await;
    let _lifecycle: Value = ws.receive_json().await;

    ws.close().await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(registry.is_empty(), "a peer close frame must remove the session");
    assert!(state_messages.lock().unwrap().is_empty());
}

#[tokio::test]
async fn real_socket_roundtrip_via_tokio_tungstenite() {
    // Drives an actual `GatewayService::run()` bound to a real TCP port,
    // rather than axum-test's in-process router, with a `tokio-tungstenite`
    // client — the same crate the teacher's `oprf-client`/`oprf-test` use to
    // talk to a live server instead of driving its router directly.
    let received: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&received);
    let on_message: onebot_forward_ws::OnMessageReceived =
        Arc::new(move |_id, msg| captured.lock().unwrap().push(msg));

    let cfg = ServiceConfig::try_parse_from([
        "gateway",
        "--bot-uin",
        "55555",
        "--port",
        "18733",
        "--heartbeat-interval-ms",
        "200",
    ])
    .expect("valid test config");

    let service = GatewayService::new(cfg, on_message);
    let shutdown = service.shutdown_handle();
    let server_task = tokio::spawn(service.run());

    // give the listener a moment to bind before connecting.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (mut ws, _response) = tokio_tungstenite::connect_async("ws://127.0.0.1:18733/universal")
        .await
        .expect("client can connect to the real listener");

    let lifecycle = ws
        .next()
        .await
        .expect("stream not closed")
        .expect("no transport error");
    let lifecycle = lifecycle.into_text().expect("lifecycle frame is text");
    let lifecycle: Value = serde_json::from_str(&lifecycle).expect("lifecycle is valid JSON");
    assert_eq!(lifecycle["sub_type"], "connect");

    ws.send(tokio_tungstenite::tungstenite::Message::text("hello from a real socket"))
        .await
        .expect("client can send");

    tokio::time::timeout(Duration::from_millis(500), async {
        loop {
            if !received.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("message delivered within the timeout");
    assert_eq!(received.lock().unwrap()[0], "hello from a real socket");

    ws.send(tokio_tungstenite::tungstenite::Message::Close(None))
        .await
        .ok();
    shutdown.cancel();
    let _ = tokio::time::timeout(Duration::from_millis(500), server_task).await;
}

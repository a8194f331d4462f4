#![allow(clippy::unwrap_used)]
// Integration tests for the realtime alert listener against an in-process
// WebSocket server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use leakwatch_api::{AlertListener, ListenerConfig, ListenerState};

// ── Helpers ─────────────────────────────────────────────────────────

const WAIT: Duration = Duration::from_secs(5);

async fn bind() -> (TcpListener, Url) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let url = Url::parse(&format!("ws://{addr}/ws/alerts/")).unwrap();
    (listener, url)
}

async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.unwrap();
    tokio_tungstenite::accept_async(stream).await.unwrap()
}

fn fast_config(max_retries: u32) -> ListenerConfig {
    ListenerConfig {
        reconnect_delay: Duration::from_millis(10),
        max_retries,
        authorization: None,
    }
}

async fn wait_for_state(listener: &AlertListener, wanted: ListenerState) {
    let mut rx = listener.watch_state();
    tokio::time::timeout(WAIT, rx.wait_for(|s| *s == wanted))
        .await
        .expect("timed out waiting for listener state")
        .unwrap();
}

// ── Filtering ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_only_potential_leaks_are_recorded() {
    let (server, url) = bind().await;
    let listener = AlertListener::spawn(url, fast_config(5), CancellationToken::new());
    let mut rx = listener.subscribe();

    let mut ws = accept(&server).await;
    ws.send(Message::text(r#"{"status":"normal","location":"Huye"}"#))
        .await
        .unwrap();
    ws.send(Message::text("not json at all")).await.unwrap();
    ws.send(Message::text(r#"{"location":"Nyagatare"}"#))
        .await
        .unwrap();
    ws.send(Message::text(
        r#"{"status":"potential_leak","location":"Musanze","flow_rate":7.5}"#,
    ))
    .await
    .unwrap();

    let alert = tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(alert.status, "potential_leak");
    assert_eq!(alert.location(), Some("Musanze"));
    assert_eq!(alert.fields.get("flow_rate"), Some(&serde_json::json!(7.5)));

    // Frames are handled in order, so the rejected ones are already behind us.
    assert_eq!(listener.len(), 1);
    assert_eq!(listener.state(), ListenerState::Open);
}

#[tokio::test]
async fn test_alerts_keep_arrival_order() {
    let (server, url) = bind().await;
    let listener = AlertListener::spawn(url, fast_config(5), CancellationToken::new());
    let mut stream = Box::pin(listener.stream());

    let mut ws = accept(&server).await;
    for location in ["Rubavu", "Karongi", "Rusizi"] {
        let frame = format!(r#"{{"status":"potential_leak","location":"{location}"}}"#);
        ws.send(Message::text(frame)).await.unwrap();
    }

    for _ in 0..3 {
        tokio::time::timeout(WAIT, stream.next()).await.unwrap().unwrap();
    }

    let locations: Vec<_> = listener
        .alerts()
        .iter()
        .map(|a| a.location().unwrap_or_default().to_owned())
        .collect();
    assert_eq!(locations, ["Rubavu", "Karongi", "Rusizi"]);
}

// ── Reconnect ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_reconnects_after_server_close() {
    let (server, url) = bind().await;
    let listener = AlertListener::spawn(url, fast_config(5), CancellationToken::new());
    let mut rx = listener.subscribe();

    let mut first = accept(&server).await;
    first.close(None).await.unwrap();
    drop(first);

    let mut second = accept(&server).await;
    second
        .send(Message::text(r#"{"status":"potential_leak","location":"Gicumbi"}"#))
        .await
        .unwrap();

    let alert = tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(alert.location(), Some("Gicumbi"));
    assert_eq!(listener.connect_attempts(), 2);
}

#[tokio::test]
async fn test_gives_up_after_retry_budget() {
    // Bind then release a port so every connect is refused.
    let (server, url) = bind().await;
    drop(server);

    let listener = AlertListener::spawn(url, fast_config(5), CancellationToken::new());
    wait_for_state(&listener, ListenerState::Exhausted).await;

    // The initial attempt plus five reconnects.
    assert_eq!(listener.connect_attempts(), 6);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(listener.connect_attempts(), 6);
    assert!(listener.is_empty());
}

// ── Teardown ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_shutdown_sends_close_frame() {
    let (server, url) = bind().await;
    let listener = AlertListener::spawn(url, fast_config(5), CancellationToken::new());

    let mut ws = accept(&server).await;
    wait_for_state(&listener, ListenerState::Open).await;

    listener.shutdown();

    let frame = tokio::time::timeout(WAIT, ws.next()).await.unwrap();
    assert!(matches!(frame, Some(Ok(Message::Close(_)))));
    wait_for_state(&listener, ListenerState::Stopped).await;
    assert_eq!(listener.connect_attempts(), 1);
}

#[tokio::test]
async fn test_cancel_during_backoff_stops_listener() {
    let (server, url) = bind().await;
    drop(server);

    let cancel = CancellationToken::new();
    let config = ListenerConfig {
        reconnect_delay: Duration::from_secs(60),
        ..fast_config(5)
    };
    let listener = AlertListener::spawn(url, config, cancel.clone());
    wait_for_state(&listener, ListenerState::Retrying { retry: 1 }).await;

    cancel.cancel();
    wait_for_state(&listener, ListenerState::Stopped).await;
    assert_eq!(listener.connect_attempts(), 1);
}

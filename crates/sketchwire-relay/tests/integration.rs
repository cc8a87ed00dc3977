//! Relay integration tests: start a real relay and interact via WS + HTTP.
//!
//! Run with: `cargo test -p sketchwire-relay --test integration`

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use sketchwire_core::config::ServerConfig;
use sketchwire_core::diagram_store::JsonDiagramStore;
use sketchwire_relay::RelayState;

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const START: &str = r#"{"type":"stroke-start","x":10,"y":10}"#;
const POINT: &str = r#"{"type":"stroke-point","x":20,"y":20}"#;
const CLEAR: &str = r#"{"type":"clear"}"#;

struct TestRelay {
    port: u16,
    stop: Option<oneshot::Sender<()>>,
    _dir: tempfile::TempDir,
}

/// Start a relay on a free port and wait until it answers `/health`.
async fn start_test_relay(replay_on_join: bool) -> TestRelay {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonDiagramStore::new(dir.path().to_path_buf()));
    let config = ServerConfig {
        replay_on_join,
        ..Default::default()
    };
    let state = Arc::new(RelayState::new(config, store));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (stop, stopped) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let shutdown = async {
            let _ = stopped.await;
        };
        let _ = sketchwire_relay::serve(listener, state, shutdown).await;
    });

    for _ in 0..50 {
        if reqwest::get(format!("http://127.0.0.1:{port}/health"))
            .await
            .is_ok()
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    TestRelay {
        port,
        stop: Some(stop),
        _dir: dir,
    }
}

impl TestRelay {
    fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }

    fn http(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", self.port)
    }

    async fn connections(&self) -> u64 {
        let body: serde_json::Value = reqwest::get(self.http("/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        body["connections"].as_u64().unwrap()
    }

    /// Connect and wait until the relay has registered the participant.
    async fn join(&self) -> Ws {
        let before = self.connections().await;
        let url = format!("ws://127.0.0.1:{}/ws/draw", self.port);
        let (ws, _) = connect_async(&url).await.expect("WS connect failed");
        self.wait_for_connections(before + 1).await;
        ws
    }

    async fn wait_for_connections(&self, expected: u64) {
        for _ in 0..100 {
            if self.connections().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("relay never reached {expected} connections");
    }
}

async fn send(ws: &mut Ws, text: &str) {
    ws.send(Message::Text(text.to_string().into())).await.unwrap();
}

async fn recv(ws: &mut Ws) -> String {
    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("timed out waiting for frame")
        .unwrap()
        .unwrap();
    msg.to_text().unwrap().to_string()
}

async fn assert_silent(ws: &mut Ws) {
    let res = tokio::time::timeout(Duration::from_millis(250), ws.next()).await;
    assert!(res.is_err(), "expected no frame, got {res:?}");
}

#[tokio::test]
async fn test_health_endpoint() {
    let relay = start_test_relay(false).await;

    let resp = reqwest::get(relay.http("/health")).await.unwrap();
    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
    assert_eq!(body["connections"], 0);
}

#[tokio::test]
async fn test_frames_reach_everyone_but_sender() {
    let relay = start_test_relay(false).await;
    let mut a = relay.join().await;
    let mut b = relay.join().await;
    let mut c = relay.join().await;

    send(&mut a, START).await;
    assert_eq!(recv(&mut b).await, START);
    assert_eq!(recv(&mut c).await, START);
    assert_silent(&mut a).await;
}

#[tokio::test]
async fn test_lone_participant_gets_nothing() {
    let relay = start_test_relay(false).await;
    let mut a = relay.join().await;

    send(&mut a, START).await;
    send(&mut a, POINT).await;
    assert_silent(&mut a).await;
}

#[tokio::test]
async fn test_per_sender_order_is_kept() {
    let relay = start_test_relay(false).await;
    let mut a = relay.join().await;
    let mut b = relay.join().await;

    let frames: Vec<String> = (0..20)
        .map(|i| json!({"type": "stroke-point", "x": i, "y": i}).to_string())
        .collect();
    for f in &frames {
        send(&mut a, f).await;
    }
    for f in &frames {
        assert_eq!(&recv(&mut b).await, f);
    }
}

#[tokio::test]
async fn test_clear_from_another_participant() {
    let relay = start_test_relay(false).await;
    let mut a = relay.join().await;
    let mut b = relay.join().await;
    let mut c = relay.join().await;

    send(&mut a, START).await;
    send(&mut a, POINT).await;
    assert_eq!(recv(&mut b).await, START);
    assert_eq!(recv(&mut b).await, POINT);
    assert_eq!(recv(&mut c).await, START);
    assert_eq!(recv(&mut c).await, POINT);

    send(&mut b, CLEAR).await;
    assert_eq!(recv(&mut a).await, CLEAR);
    assert_eq!(recv(&mut c).await, CLEAR);
    assert_silent(&mut b).await;
}

#[tokio::test]
async fn test_unknown_frames_are_relayed_untouched() {
    let relay = start_test_relay(false).await;
    let mut a = relay.join().await;
    let mut b = relay.join().await;

    let odd = r#"{"type":"cursor","x":1}"#;
    send(&mut a, odd).await;
    assert_eq!(recv(&mut b).await, odd);
}

#[tokio::test]
async fn test_departed_participant_is_skipped() {
    let relay = start_test_relay(false).await;
    let mut a = relay.join().await;
    let mut b = relay.join().await;
    let mut c = relay.join().await;

    c.close(None).await.unwrap();
    relay.wait_for_connections(2).await;

    send(&mut a, START).await;
    assert_eq!(recv(&mut b).await, START);
}

#[tokio::test]
async fn test_late_joiner_replay() {
    let relay = start_test_relay(true).await;
    let mut a = relay.join().await;

    send(&mut a, START).await;
    send(&mut a, CLEAR).await;
    send(&mut a, START).await;
    send(&mut a, POINT).await;
    // Give the relay time to process before the late join.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let mut late = relay.join().await;
    assert_eq!(recv(&mut late).await, START);
    assert_eq!(recv(&mut late).await, POINT);
    assert_silent(&mut late).await;
}

#[tokio::test]
async fn test_save_and_list_diagrams() {
    let relay = start_test_relay(false).await;
    let client = reqwest::Client::new();

    let strokes = json!([{"points": [{"x": 10, "y": 10}, {"x": 20, "y": 20}]}]);
    let resp = client
        .post(relay.http("/diagrams"))
        .json(&json!({"owner": "alice", "title": "t1", "strokes": strokes, "is_shared": false}))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let created: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(created["message"], "Diagram saved successfully");
    let id = created["id"].as_u64().unwrap();

    let mine: serde_json::Value = reqwest::get(relay.http("/diagrams/user/alice"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["title"], "t1");
    assert!(mine[0].get("strokes").is_none());

    let shared: serde_json::Value = reqwest::get(relay.http("/diagrams/shared"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(shared.as_array().unwrap().is_empty());

    client
        .post(relay.http("/diagrams"))
        .json(&json!({"owner": "alice", "title": "t1", "strokes": strokes, "is_shared": true}))
        .send()
        .await
        .unwrap();
    let shared: serde_json::Value = reqwest::get(relay.http("/diagrams/shared"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(shared.as_array().unwrap().len(), 1);
    assert_eq!(shared[0]["owner"], "alice");

    let full: serde_json::Value = reqwest::get(relay.http(&format!("/diagrams/{id}")))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(full["strokes"][0]["points"][1]["x"], 20.0);
}

#[tokio::test]
async fn test_save_without_title_is_rejected() {
    let relay = start_test_relay(false).await;
    let resp = reqwest::Client::new()
        .post(relay.http("/diagrams"))
        .json(&json!({"owner": "alice", "strokes": []}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["detail"], "Owner and title are required");
}

#[tokio::test]
async fn test_shutdown_closes_participants() {
    let mut relay = start_test_relay(false).await;
    let mut a = relay.join().await;
    let mut b = relay.join().await;

    relay.stop();
    for ws in [&mut a, &mut b] {
        let msg = tokio::time::timeout(Duration::from_secs(3), ws.next())
            .await
            .expect("socket left open after shutdown");
        assert!(matches!(msg, Some(Ok(Message::Close(_)))), "got {msg:?}");
    }
}

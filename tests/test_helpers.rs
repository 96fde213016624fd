//! Shared scaffolding for the end-to-end scenario tests. Spins up a real
//! session fabric instance (every background worker running, listening on
//! an OS-assigned port) so the scenario tests can drive it the way a real
//! client would: over an actual WebSocket connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use session_fabric::config::Config;
use session_fabric::server::{self, AppState};

pub type TestSocket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// A running instance plus the handle needed to tear it down.
#[allow(dead_code)]
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub cancel: CancellationToken,
    serve_task: JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.serve_task.abort();
    }
}

/// A configuration tuned for fast, deterministic tests: short sweep/tick
/// intervals everywhere a production deployment would use minutes.
#[allow(dead_code)]
pub fn fast_test_config() -> Config {
    let mut config = Config::default();
    config.matchmaking.tick_interval_secs = 0;
    config.matchmaking.tick_interval = Duration::from_millis(150);
    config.room.sweep_interval_secs = 0;
    config.room.sweep_interval = Duration::from_millis(150);
    config.bus.cleanup_interval_secs = 0;
    config.bus.cleanup_interval = Duration::from_millis(200);
    config.connection.reap_interval_secs = 0;
    config.connection.reap_interval = Duration::from_millis(150);
    config
}

/// Build and serve one instance on a random loopback port, running every
/// background worker (reaper, distributor, sweep, matching loop) for real.
#[allow(dead_code)]
pub async fn spawn_test_server(config: Config) -> TestServer {
    let (state, cancel) = server::build(Arc::new(config));
    let app = session_fabric::websocket::router(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");

    let serve_task = tokio::spawn(async move {
        let _ = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await;
    });

    TestServer {
        addr,
        state,
        cancel,
        serve_task,
    }
}

/// Connect a client as `username` and drain the initial `connected` frame.
#[allow(dead_code)]
pub async fn connect_client(addr: SocketAddr, username: &str) -> TestSocket {
    let url = format!("ws://{addr}/ws/{username}");
    let (mut socket, _) = connect_async(url).await.expect("websocket connect");
    let connected = next_json(&mut socket).await;
    assert_eq!(connected["type"], "connected");
    socket
}

/// Send a JSON envelope of the given `type`/`data`.
#[allow(dead_code)]
pub async fn send_json(socket: &mut TestSocket, kind: &str, data: Value) {
    let envelope = json!({
        "type": kind,
        "data": data,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    socket
        .send(Message::Text(envelope.to_string().into()))
        .await
        .expect("send frame");
}

/// Wait (bounded) for the next text frame and parse it as JSON.
#[allow(dead_code)]
pub async fn next_json(socket: &mut TestSocket) -> Value {
    next_json_timeout(socket, Duration::from_secs(5)).await
}

#[allow(dead_code)]
pub async fn next_json_timeout(socket: &mut TestSocket, timeout: Duration) -> Value {
    loop {
        let message = tokio::time::timeout(timeout, socket.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .expect("websocket error");
        match message {
            Message::Text(text) => return serde_json::from_str(&text).expect("valid json frame"),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Wait until a frame of the given `type` arrives, skipping anything else
/// (used where a client might also see unrelated chatter first).
#[allow(dead_code)]
pub async fn next_json_of_type(socket: &mut TestSocket, kind: &str, timeout: Duration) -> Value {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        assert!(remaining > Duration::ZERO, "timed out waiting for frame type {kind}");
        let value = next_json_timeout(socket, remaining).await;
        if value["type"] == kind {
            return value;
        }
    }
}

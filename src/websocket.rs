//! WebSocket transport and the small set of HTTP endpoints §6.1 names as
//! part of the core's external interface (the upgrade route itself, plus
//! liveness/metrics). Room and matchmaking REST endpoints are explicitly
//! out of scope — a thin translation layer a real deployment adds on top.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::connect_info::ConnectInfo;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, instrument, warn};

use crate::matchmaking::MatchmakingError;
use crate::protocol::{ClientMessage, Envelope, ErrorCode, MatchmakingAction, ServerMessage};
use crate::room::RoomError;
use crate::server::AppState;

pub fn router(state: AppState) -> Router {
    let cors = build_cors(&state.config.allowed_origins, state.config.enable_cors);

    Router::new()
        .route("/ws/{username}", get(ws_upgrade))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn build_cors(allowed_origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        return CorsLayer::new();
    }
    if allowed_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let origins: Vec<_> = allowed_origins
        .iter()
        .filter_map(|o| o.parse::<axum::http::HeaderValue>().ok())
        .collect();
    if origins.is_empty() {
        warn!("no valid CORS origins configured, falling back to permissive CORS");
        return CorsLayer::permissive();
    }
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics.render_prometheus()
}

#[instrument(skip(ws, state), fields(%username))]
async fn ws_upgrade(
    Path(username): Path<String>,
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    debug!(%peer, "websocket upgrade requested");
    ws.on_upgrade(move |socket| handle_socket(socket, username, state))
}

/// One Connection's worker pair, run concurrently: a reader that parses
/// inbound frames and routes them into the core, and a writer that drains
/// the connection's outbound queue. A third branch drives the heartbeat —
/// a protocol-level ping every `heartbeat_interval`, with `last_activity`
/// touched on every successful read or pong so the reaper can tell a live
/// connection from an abandoned one. Either side ending tears the other
/// down via `tokio::select!`.
async fn handle_socket(socket: WebSocket, username: String, state: AppState) {
    let (conn, mut outbound_rx) = state.pool.register(username.clone()).await;
    let connection_id = conn.id;
    info!(%username, %connection_id, "connection registered");

    let (mut ws_tx, mut ws_rx) = socket.split();

    let connected = ServerMessage::Connected {
        username: username.clone(),
    }
    .into_envelope(None);
    if let Ok(text) = serde_json::to_string(&connected) {
        let _ = ws_tx.send(Message::Text(text.into())).await;
    }

    let mut heartbeat = tokio::time::interval(state.config.connection.heartbeat_interval);
    heartbeat.tick().await; // first tick fires immediately; skip it

    loop {
        tokio::select! {
            envelope = outbound_rx.recv() => {
                let Some(envelope) = envelope else { break };
                match serde_json::to_string(envelope.as_ref()) {
                    Ok(text) => {
                        if ws_tx.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!(error = %err, "failed to serialize outbound envelope"),
                }
            }
            message = ws_rx.next() => {
                let Some(Ok(message)) = message else { break };
                match message {
                    Message::Text(text) => {
                        conn.touch();
                        if let Err(reply) = route_message(&text, &username, &state).await {
                            send_reply(&state, &username, reply);
                        }
                    }
                    Message::Pong(_) => conn.touch(),
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            _ = heartbeat.tick() => {
                if conn.idle_for() > state.config.connection.read_deadline {
                    debug!(%username, %connection_id, "no activity within read deadline, closing");
                    break;
                }
                if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    state.pool.unregister(connection_id).await;
    info!(%username, %connection_id, "connection unregistered");
}

/// Push a `ServerMessage` straight onto `username`'s outbound queue,
/// bypassing the bus — this is a direct reply to one request, not an
/// event other subscribers might care about.
fn send_reply(state: &AppState, username: &str, reply: ServerMessage) {
    state.pool.send_to_user(username, Arc::new(reply.into_envelope(None)));
}

/// Parse and dispatch one inbound frame. Returns `Err(ServerMessage::Error)`
/// for the caller to send back rather than sending it directly, so every
/// reply path in this function is a plain value.
async fn route_message(text: &str, username: &str, state: &AppState) -> Result<(), ServerMessage> {
    let envelope: Envelope = serde_json::from_str(text).map_err(|_| invalid_message())?;
    let message = envelope.into_client_message().map_err(|_| unknown_message_type())?;

    match message {
        ClientMessage::Ping => {
            send_reply(state, username, ServerMessage::Pong);
            Ok(())
        }
        ClientMessage::JoinRoom {
            game_type,
            room_id,
            settings,
            password,
        } => match room_id {
            Some(room_id) => state
                .rooms
                .join_room(room_id, username.to_string(), password)
                .await
                .map_err(room_error),
            None => {
                let settings = settings.unwrap_or_else(|| crate::protocol::RoomSettings {
                    name: format!("{username}'s room"),
                    min_players: state.config.room.min_players_per_room,
                    max_players: state.config.room.max_players_per_room,
                    is_private: false,
                    password: None,
                });
                state
                    .rooms
                    .create_room(username.to_string(), game_type, settings)
                    .await
                    .map(|_| ())
                    .map_err(room_error)
            }
        },
        ClientMessage::LeaveRoom => {
            let Some(room_id) = state.rooms.room_of(username) else {
                return Err(room_error(RoomError::NotInRoom));
            };
            state.rooms.leave_room(room_id, username).await.map_err(room_error)
        }
        ClientMessage::GameAction { action } => {
            let Some(room_id) = state.rooms.room_of(username) else {
                return Err(room_error(RoomError::NotInRoom));
            };
            state
                .rooms
                .process_action(room_id, username, action)
                .await
                .map_err(room_error)
        }
        ClientMessage::Matchmaking {
            action,
            game_type,
            skill_level,
            preferred_players,
            max_wait_time,
            preferences,
        } => handle_matchmaking(action, username, game_type, skill_level, preferred_players, max_wait_time, preferences, state).await,
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_matchmaking(
    action: MatchmakingAction,
    username: &str,
    game_type: Option<String>,
    skill_level: Option<u8>,
    preferred_players: Option<u8>,
    max_wait_time: Option<u64>,
    preferences: serde_json::Value,
    state: &AppState,
) -> Result<(), ServerMessage> {
    match action {
        MatchmakingAction::Join => {
            let game_type = game_type.ok_or_else(invalid_message)?;
            state
                .matchmaking
                .join(
                    username.to_string(),
                    game_type,
                    skill_level.unwrap_or(50),
                    preferred_players.unwrap_or(state.config.matchmaking.min_players_per_match),
                    max_wait_time,
                    preferences,
                )
                .await
                .map_err(matchmaking_error)
        }
        MatchmakingAction::Cancel => state.matchmaking.leave(username).await.map_err(matchmaking_error),
        MatchmakingAction::Status => {
            let status = state.matchmaking.status(username).await;
            let reply = match status {
                Some(info) => ServerMessage::MatchmakingStatus {
                    status: "searching".to_string(),
                    wait_seconds: info.wait_seconds,
                    pool_size: info.pool_size,
                },
                None => ServerMessage::MatchmakingStatus {
                    status: "idle".to_string(),
                    wait_seconds: 0,
                    pool_size: 0,
                },
            };
            send_reply(state, username, reply);
            Ok(())
        }
    }
}

fn invalid_message() -> ServerMessage {
    ServerMessage::Error {
        message: "invalid message".to_string(),
        error_code: ErrorCode::InvalidMessage,
    }
}

fn unknown_message_type() -> ServerMessage {
    ServerMessage::Error {
        message: "unknown message type".to_string(),
        error_code: ErrorCode::UnknownMessageType,
    }
}

fn room_error(err: RoomError) -> ServerMessage {
    ServerMessage::Error {
        message: err.to_string(),
        error_code: err.code(),
    }
}

fn matchmaking_error(err: MatchmakingError) -> ServerMessage {
    ServerMessage::Error {
        message: err.to_string(),
        error_code: err.code(),
    }
}

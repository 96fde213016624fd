use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a connection, generated at registration time.
pub type ConnectionId = Uuid;
/// Unique identifier for a room.
pub type RoomId = Uuid;
/// Unique identifier for an event on the bus.
pub type EventId = Uuid;
/// Unique identifier for a matchmaking request.
pub type RequestId = Uuid;
/// Unique identifier for a bus subscription.
pub type SubscriptionId = Uuid;

/// Caller-supplied player handle. The core treats this as an opaque,
/// already-authenticated identity; it never validates credentials.
pub type Username = String;

/// Lifecycle state of a Connection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Open,
    Closing,
    Closed,
}

/// Lifecycle state of a Room.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoomState {
    #[default]
    Waiting,
    Ready,
    InProgress,
    Completed,
    Closed,
}

/// A member's standing within a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub username: Username,
    pub is_ready: bool,
    pub is_host: bool,
    pub score: i64,
    pub last_action_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Opaque per-player game state. Never interpreted by the core.
    #[serde(default)]
    pub game_data: serde_json::Value,
}

impl Player {
    pub fn new(username: Username, is_host: bool) -> Self {
        Self {
            username,
            is_ready: false,
            is_host,
            score: 0,
            last_action_at: None,
            game_data: serde_json::Value::Null,
        }
    }
}

/// Settings supplied when creating a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettings {
    pub name: String,
    pub min_players: u8,
    pub max_players: u8,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub password: Option<String>,
}

/// Preferences attached to a matchmaking request. Opaque to the core
/// beyond what's needed to group requests; forwarded verbatim in events.
pub type MatchmakingPreferences = serde_json::Value;

/// Reason a matchmaking request was cancelled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    UserCancelled,
    Timeout,
}

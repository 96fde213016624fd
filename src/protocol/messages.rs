use serde::{Deserialize, Serialize};

use super::error_codes::ErrorCode;
use super::types::{MatchmakingPreferences, Player, RoomId, RoomSettings, Username};

/// Wire envelope for every frame exchanged over the persistent connection,
/// in both directions. `data` carries a `type`-specific payload as opaque
/// JSON; the core never requires clients to agree on a schema beyond the
/// envelope itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub from: Option<Username>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub to: Option<Username>,
    #[serde(rename = "roomId", skip_serializing_if = "Option::is_none", default)]
    pub room_id: Option<RoomId>,
}

impl Envelope {
    pub fn new(kind: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            data,
            timestamp: chrono::Utc::now(),
            from: None,
            to: None,
            room_id: None,
        }
    }

    pub fn with_room(mut self, room_id: RoomId) -> Self {
        self.room_id = Some(room_id);
        self
    }

    pub fn with_from(mut self, from: Username) -> Self {
        self.from = Some(from);
        self
    }

    /// Reconstruct the typed [`ClientMessage`] this envelope carries.
    /// An unknown `type` or malformed `data` surfaces as a serde error,
    /// which callers translate to [`ErrorCode::UnknownMessageType`] /
    /// [`ErrorCode::InvalidMessage`] without tearing down the connection.
    pub fn into_client_message(&self) -> Result<ClientMessage, serde_json::Error> {
        serde_json::from_value(serde_json::json!({
            "type": self.kind,
            "data": self.data,
        }))
    }
}

/// Requests a client can send. Parsed from an [`Envelope`] whose `type`
/// matches one of the variants below; an unrecognized `type` yields
/// [`ErrorCode::UnknownMessageType`] rather than a hard disconnect.
#[derive(Debug, Clone, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    Ping,
    JoinRoom {
        game_type: String,
        /// Join an existing room; omitted to create a new one.
        room_id: Option<RoomId>,
        #[serde(default)]
        settings: Option<RoomSettings>,
        #[serde(default)]
        password: Option<String>,
    },
    LeaveRoom,
    GameAction {
        action: serde_json::Value,
    },
    Matchmaking {
        action: MatchmakingAction,
        #[serde(default)]
        game_type: Option<String>,
        #[serde(default)]
        skill_level: Option<u8>,
        #[serde(default)]
        preferred_players: Option<u8>,
        #[serde(default)]
        max_wait_time: Option<u64>,
        #[serde(default)]
        preferences: MatchmakingPreferences,
    },
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchmakingAction {
    Join,
    Cancel,
    Status,
}

/// Notifications the core pushes to clients. Each variant renders to the
/// envelope's `type` field (see `ServerMessage::kind`) with the rest of the
/// struct becoming `data`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Connected {
        username: Username,
    },
    Error {
        message: String,
        error_code: ErrorCode,
    },
    Pong,
    PlayerJoined {
        player: Player,
    },
    PlayerLeft {
        username: Username,
    },
    PlayerReady {
        username: Username,
    },
    PlayerNotReady {
        username: Username,
    },
    HostChanged {
        new_host: Username,
    },
    GameStarted {
        start_time: chrono::DateTime<chrono::Utc>,
    },
    GameAction {
        from: Username,
        action: serde_json::Value,
    },
    GameStateUpdate {
        state: serde_json::Value,
    },
    GameEnded {
        players: Vec<Player>,
        end_time: chrono::DateTime<chrono::Utc>,
    },
    RoomClosed {
        reason: String,
    },
    MatchmakingStatus {
        status: String,
        wait_seconds: u64,
        pool_size: usize,
    },
    MatchFound {
        room_id: RoomId,
        game_type: String,
        player_count: u8,
        average_skill: f64,
    },
    MatchCancelled {
        reason: String,
    },
}

impl ServerMessage {
    /// The envelope `type` string for this variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Error { .. } => "error",
            Self::Pong => "pong",
            Self::PlayerJoined { .. } => "player_joined",
            Self::PlayerLeft { .. } => "player_left",
            Self::PlayerReady { .. } => "player_ready",
            Self::PlayerNotReady { .. } => "player_not_ready",
            Self::HostChanged { .. } => "host_changed",
            Self::GameStarted { .. } => "game_started",
            Self::GameAction { .. } => "game_action",
            Self::GameStateUpdate { .. } => "game_state_update",
            Self::GameEnded { .. } => "game_ended",
            Self::RoomClosed { .. } => "room_closed",
            Self::MatchmakingStatus { .. } => "matchmaking",
            Self::MatchFound { .. } => "match_found",
            Self::MatchCancelled { .. } => "match_cancelled",
        }
    }

    /// Render into the wire [`Envelope`], optionally scoped to a room.
    pub fn into_envelope(self, room_id: Option<RoomId>) -> Envelope {
        let kind = self.kind();
        let data = serde_json::to_value(&self).unwrap_or(serde_json::Value::Null);
        let mut envelope = Envelope::new(kind, data);
        envelope.room_id = room_id;
        envelope
    }
}

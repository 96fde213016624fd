use serde::{Deserialize, Serialize};

/// Stable, wire-visible error codes. Every synchronous failure path in the
/// core maps to one of these so a client can branch on the code rather than
/// parsing the human-readable message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Room errors
    AlreadyInRoom,
    RoomNotFound,
    RoomFull,
    RoomNotAccepting,
    BadPassword,
    NotInRoom,
    NotHost,
    NotReady,
    InvalidRoomSettings,
    UnsupportedGameType,

    // Matchmaking errors
    AlreadyMatchmaking,
    NotMatchmaking,
    MatchmakingCooldown,

    // Protocol errors
    InvalidMessage,
    UnknownMessageType,

    // Server errors
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyInRoom => "already_in_room",
            Self::RoomNotFound => "room_not_found",
            Self::RoomFull => "room_full",
            Self::RoomNotAccepting => "room_not_accepting",
            Self::BadPassword => "bad_password",
            Self::NotInRoom => "not_in_room",
            Self::NotHost => "not_host",
            Self::NotReady => "not_ready",
            Self::InvalidRoomSettings => "invalid_room_settings",
            Self::UnsupportedGameType => "unsupported_game_type",
            Self::AlreadyMatchmaking => "already_matchmaking",
            Self::NotMatchmaking => "not_matchmaking",
            Self::MatchmakingCooldown => "matchmaking_cooldown",
            Self::InvalidMessage => "invalid_message",
            Self::UnknownMessageType => "unknown_message_type",
            Self::InternalError => "internal_error",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

use thiserror::Error;

use crate::protocol::ErrorCode;

/// Failure kinds for every Room Manager (C3) operation. Each maps to a
/// stable [`ErrorCode`] sent back to the client verbatim — no error ever
/// crosses the room manager's synchronous API as anything but a value.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RoomError {
    #[error("user is already in a room")]
    AlreadyInRoom,
    #[error("unsupported game type")]
    UnsupportedGameType,
    #[error("room not found")]
    RoomNotFound,
    #[error("room is full")]
    RoomFull,
    #[error("room is not accepting new players")]
    RoomNotAccepting,
    #[error("incorrect room password")]
    BadPassword,
    #[error("user is not in this room")]
    NotInRoom,
    #[error("user is not the host")]
    NotHost,
    #[error("room is not ready to start")]
    NotReady,
    #[error("invalid room settings")]
    InvalidRoomSettings,
}

impl RoomError {
    pub fn code(self) -> ErrorCode {
        match self {
            Self::AlreadyInRoom => ErrorCode::AlreadyInRoom,
            Self::UnsupportedGameType => ErrorCode::UnsupportedGameType,
            Self::RoomNotFound => ErrorCode::RoomNotFound,
            Self::RoomFull => ErrorCode::RoomFull,
            Self::RoomNotAccepting => ErrorCode::RoomNotAccepting,
            Self::BadPassword => ErrorCode::BadPassword,
            Self::NotInRoom => ErrorCode::NotInRoom,
            Self::NotHost => ErrorCode::NotHost,
            Self::NotReady => ErrorCode::NotReady,
            Self::InvalidRoomSettings => ErrorCode::InvalidRoomSettings,
        }
    }
}

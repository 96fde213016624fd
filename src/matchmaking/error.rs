use thiserror::Error;

use crate::protocol::ErrorCode;

/// Failure kinds for Matchmaking Service (C4) operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MatchmakingError {
    #[error("user is already matchmaking")]
    AlreadyMatchmaking,
    #[error("user is already in a room")]
    AlreadyInRoom,
    #[error("user is in a post-match cooldown")]
    Cooldown,
    #[error("user has no open matchmaking request")]
    NotMatchmaking,
}

impl MatchmakingError {
    pub fn code(self) -> ErrorCode {
        match self {
            Self::AlreadyMatchmaking => ErrorCode::AlreadyMatchmaking,
            Self::AlreadyInRoom => ErrorCode::AlreadyInRoom,
            Self::Cooldown => ErrorCode::MatchmakingCooldown,
            Self::NotMatchmaking => ErrorCode::NotMatchmaking,
        }
    }
}

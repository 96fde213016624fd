//! Matchmaking Service (C4): per-game-type pools, a periodic tick that
//! groups waiting players into rooms under a dynamically expanding skill
//! window, and per-user post-match cooldowns.

mod error;
mod pool;
mod request;
mod service;

pub use error::MatchmakingError;
pub use request::MatchmakingRequest;
pub use service::{MatchmakingService, MatchmakingStatusInfo};

//! Protocol module: wire envelope, typed client/server messages, and the
//! identifiers and data types shared across the core components.

pub mod error_codes;
pub mod messages;
pub mod types;

pub use error_codes::ErrorCode;
pub use messages::{ClientMessage, Envelope, MatchmakingAction, ServerMessage};
pub use types::{
    CancelReason, ConnectionId, ConnectionState, EventId, MatchmakingPreferences, Player,
    RequestId, RoomId, RoomSettings, RoomState, SubscriptionId, Username,
};

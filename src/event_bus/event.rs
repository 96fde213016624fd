use serde::{Deserialize, Serialize};

use crate::protocol::{EventId, RoomId, Username};

/// The closed set of event kinds that can be placed on the bus. Unlike the
/// wire-level `ServerMessage`/`ClientMessage` envelopes, an `EventType`
/// never carries its own payload; it only names what happened.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Connect,
    Disconnect,
    RoomCreate,
    RoomJoin,
    RoomLeave,
    RoomClose,
    /// Not in the closed set listed in §4.2, but required by §4.3's host
    /// migration step and the `host_changed` wire message of §6.1 — see
    /// DESIGN.md for the resolution.
    HostChanged,
    GameStart,
    GameAction,
    GameUpdate,
    GameEnd,
    GamePause,
    GameResume,
    PlayerReady,
    PlayerNotReady,
    PlayerScore,
    PlayerAction,
    MatchmakingStart,
    MatchmakingCancel,
    MatchFound,
    MatchTimeout,
    SystemError,
    SystemMaintenance,
    SystemShutdown,
}

/// An immutable record placed on the bus. `source` names the component
/// that produced it (`"room_manager"`, `"matchmaking"`, `"connection_pool"`,
/// ...); `target` is consulted only by the client bridge subscriber
/// (`"all"` broadcasts, otherwise delivery follows `room_id`/`username`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: EventId,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<Username>,
    #[serde(default)]
    pub data: serde_json::Value,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Milliseconds, not `chrono::Duration`: chrono's `serde` feature only
    /// covers `DateTime`/`Naive*`, not `Duration` itself, so a field of
    /// that type would make the derived `Serialize`/`Deserialize` impls
    /// uncompilable. Same `_ms` wire-field idea `config/types.rs` uses
    /// for `std::time::Duration`, just without a materialized twin since
    /// every read site only needs the comparison `is_expired` already does.
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "ttl")]
    pub ttl_ms: Option<i64>,
}

impl Event {
    pub fn new(event_type: EventType, source: impl Into<String>) -> Self {
        Self {
            event_id: EventId::new_v4(),
            event_type,
            source: source.into(),
            target: None,
            room_id: None,
            session_id: None,
            username: None,
            data: serde_json::Value::Null,
            timestamp: chrono::Utc::now(),
            ttl_ms: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_room(mut self, room_id: RoomId) -> Self {
        self.room_id = Some(room_id);
        self
    }

    pub fn with_username(mut self, username: Username) -> Self {
        self.username = Some(username);
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.ttl_ms = Some(ttl.num_milliseconds());
        self
    }

    /// Whether this event's TTL (if any) has elapsed relative to now.
    pub fn is_expired(&self) -> bool {
        match self.ttl_ms {
            Some(ttl_ms) => chrono::Utc::now() - self.timestamp > chrono::Duration::milliseconds(ttl_ms),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_without_ttl_never_expires() {
        let event = Event::new(EventType::Connect, "connection_pool");
        assert!(!event.is_expired());
    }

    #[test]
    fn event_with_elapsed_ttl_is_expired() {
        let mut event = Event::new(EventType::Connect, "connection_pool");
        event.ttl_ms = Some(chrono::Duration::seconds(1).num_milliseconds());
        event.timestamp = chrono::Utc::now() - chrono::Duration::seconds(5);
        assert!(event.is_expired());
    }
}

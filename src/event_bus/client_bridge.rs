use std::sync::Arc;

use async_trait::async_trait;

use crate::connection::ConnectionPool;
use crate::protocol::Envelope;

use super::event::{Event, EventType};
use super::subscription::EventHandler;

/// Converts events into outbound client frames and fans them out through
/// the connection pool. Subscribed to every event type; routing is
/// decided per-event rather than per-subscription:
/// `username` set → `SendToUser`; else `room_id` set → `SendToRoom`;
/// else `target == "all"` → `Broadcast`; otherwise the event stays
/// server-internal and nothing is sent.
pub struct ClientBridge {
    pool: Arc<ConnectionPool>,
    event_types: Vec<EventType>,
}

impl ClientBridge {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self {
            pool,
            event_types: ALL_EVENT_TYPES.to_vec(),
        }
    }
}

const ALL_EVENT_TYPES: &[EventType] = &[
    EventType::Connect,
    EventType::Disconnect,
    EventType::RoomCreate,
    EventType::RoomJoin,
    EventType::RoomLeave,
    EventType::RoomClose,
    EventType::HostChanged,
    EventType::GameStart,
    EventType::GameAction,
    EventType::GameUpdate,
    EventType::GameEnd,
    EventType::GamePause,
    EventType::GameResume,
    EventType::PlayerReady,
    EventType::PlayerNotReady,
    EventType::PlayerScore,
    EventType::PlayerAction,
    EventType::MatchmakingStart,
    EventType::MatchmakingCancel,
    EventType::MatchFound,
    EventType::MatchTimeout,
    EventType::SystemError,
    EventType::SystemMaintenance,
    EventType::SystemShutdown,
];

#[async_trait]
impl EventHandler for ClientBridge {
    fn event_types(&self) -> &[EventType] {
        &self.event_types
    }

    async fn handle_event(&self, event: &Event) -> anyhow::Result<()> {
        let wire_type = wire_type_for(event.event_type);
        let mut envelope = Envelope::new(wire_type, event.data.clone());
        envelope.room_id = event.room_id;
        envelope.from = event.username.clone();

        if let Some(username) = &event.username {
            self.pool.send_to_user(username, Arc::new(envelope));
        } else if let Some(room_id) = event.room_id {
            self.pool.send_to_room(room_id, Arc::new(envelope), None);
        } else if event.target.as_deref() == Some("all") {
            self.pool.broadcast(Arc::new(envelope));
        }
        // Otherwise the event has no addressable recipient and stays
        // server-internal (e.g. a bare `system_error` with no username
        // or room attached).
        Ok(())
    }
}

/// Map an internal [`EventType`] to the wire `type` string clients expect.
/// Most variants pass through verbatim; a few diverge because the wire
/// protocol names the *reaction* (`host_changed`, `player_joined`) while
/// the bus names the *cause* (`room_join`, `room_leave`).
fn wire_type_for(event_type: EventType) -> &'static str {
    match event_type {
        EventType::Connect => "connected",
        EventType::Disconnect => "disconnected",
        EventType::RoomCreate => "room_created",
        EventType::RoomJoin => "player_joined",
        EventType::RoomLeave => "player_left",
        EventType::RoomClose => "room_closed",
        EventType::HostChanged => "host_changed",
        EventType::GameStart => "game_started",
        EventType::GameAction => "game_action",
        EventType::GameUpdate => "game_state_update",
        EventType::GameEnd => "game_ended",
        EventType::GamePause => "game_paused",
        EventType::GameResume => "game_resumed",
        EventType::PlayerReady => "player_ready",
        EventType::PlayerNotReady => "player_not_ready",
        EventType::PlayerScore => "player_score",
        EventType::PlayerAction => "player_action",
        EventType::MatchmakingStart => "matchmaking",
        EventType::MatchmakingCancel => "match_cancelled",
        EventType::MatchFound => "match_found",
        EventType::MatchTimeout => "match_cancelled",
        EventType::SystemError => "error",
        EventType::SystemMaintenance => "system_maintenance",
        EventType::SystemShutdown => "system_shutdown",
    }
}

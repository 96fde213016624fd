//! Event Processor (C5): cross-cutting reactions to bus events that don't
//! belong to any single component. Subscribed to every event type as an
//! [`EventHandler`]; most events are ignored, a couple trigger a reaction.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::engine::{GameResult, SharedMiniGameEngine, SharedPointAwarder};
use crate::event_bus::{Event, EventHandler, EventType};
use crate::matchmaking::MatchmakingService;
use crate::protocol::Player;
use crate::room::RoomManager;

/// All event types the processor is subscribed to; it filters internally
/// since only two of them trigger a reaction (spec §4.5).
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

pub struct EventProcessor {
    rooms: Arc<RoomManager>,
    matchmaking: Arc<MatchmakingService>,
    engine: SharedMiniGameEngine,
    awarder: SharedPointAwarder,
}

impl EventProcessor {
    pub fn new(
        rooms: Arc<RoomManager>,
        matchmaking: Arc<MatchmakingService>,
        engine: SharedMiniGameEngine,
        awarder: SharedPointAwarder,
    ) -> Arc<Self> {
        Arc::new(Self {
            rooms,
            matchmaking,
            engine,
            awarder,
        })
    }

    /// `disconnect`: leave matchmaking (ignoring not-found) and, if the
    /// user is in a room, leave it too.
    async fn on_disconnect(&self, username: &str) {
        if let Err(err) = self.matchmaking.leave(username).await {
            if err != crate::matchmaking::MatchmakingError::NotMatchmaking {
                warn!(username, error = %err, "unexpected error leaving matchmaking on disconnect");
            }
        }
        if let Some(room_id) = self.rooms.room_of(username) {
            if let Err(err) = self.rooms.leave_room(room_id, username).await {
                warn!(username, error = %err, "failed to leave room on disconnect");
            }
        }
    }

    /// `game_end`: score every player with a positive score through the
    /// game-rule collaborator and award valid rewards. Both interfaces are
    /// external collaborators the core never implements itself (spec §1).
    async fn on_game_end(&self, event: &Event) {
        let Some(room_id) = event.room_id else {
            return;
        };
        let Some(players) = event
            .data
            .get("players")
            .and_then(|v| serde_json::from_value::<Vec<Player>>(v.clone()).ok())
        else {
            return;
        };
        let game_type = event
            .data
            .get("gameType")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        for player in players {
            if player.score <= 0 {
                continue;
            }
            let result = GameResult {
                room_id,
                game_type: game_type.clone(),
                username: player.username.clone(),
                score: player.score,
            };
            let reward = self.engine.calculate_reward(&result).await;
            if reward.is_valid {
                self.awarder.award_points(&result, &reward).await;
                info!(username = %player.username, room_id = %room_id, points = reward.points, "reward awarded");
            }
        }
    }
}

#[async_trait]
impl EventHandler for EventProcessor {
    fn event_types(&self) -> &[EventType] {
        ALL_EVENT_TYPES
    }

    async fn handle_event(&self, event: &Event) -> anyhow::Result<()> {
        match event.event_type {
            EventType::Disconnect => {
                if let Some(username) = &event.username {
                    self.on_disconnect(username).await;
                }
            }
            EventType::GameEnd => self.on_game_end(event).await,
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BusConfig, ConnectionConfig, MatchmakingConfig, RoomConfig};
    use crate::connection::ConnectionPool;
    use crate::engine::StaticGameEngine;
    use crate::event_bus::EventBus;
    use crate::protocol::{RoomSettings, Username};
    use std::sync::Mutex as StdMutex;

    /// Records every award so a test can assert the reaction actually ran,
    /// rather than inferring it from a side effect that might never fire.
    #[derive(Default)]
    struct SpyPointAwarder {
        calls: StdMutex<Vec<(Username, i64)>>,
    }

    #[async_trait]
    impl crate::engine::PointAwarder for SpyPointAwarder {
        async fn award_points(&self, result: &GameResult, reward: &crate::engine::RewardResult) {
            self.calls.lock().unwrap().push((result.username.clone(), reward.points));
        }
    }

    fn test_processor() -> (Arc<EventProcessor>, Arc<RoomManager>, Arc<MatchmakingService>, Arc<SpyPointAwarder>) {
        let metrics = Arc::new(crate::metrics::ServerMetrics::new());
        let bus = EventBus::new(BusConfig::default(), metrics.clone());
        let pool = Arc::new(ConnectionPool::new(ConnectionConfig::default(), metrics.clone(), bus.clone()));
        let engine: SharedMiniGameEngine = Arc::new(StaticGameEngine::new(&["click_speed".to_string()], 2, 8));
        let rooms = RoomManager::new(RoomConfig::default(), bus.clone(), pool, metrics.clone(), engine.clone());
        let matchmaking = MatchmakingService::new(MatchmakingConfig::default(), bus, rooms.clone(), metrics);
        let awarder = Arc::new(SpyPointAwarder::default());
        let processor = EventProcessor::new(rooms.clone(), matchmaking.clone(), engine, awarder.clone());
        (processor, rooms, matchmaking, awarder)
    }

    #[tokio::test]
    async fn disconnect_while_matchmaking_leaves_the_pool() {
        let (processor, _rooms, matchmaking, _awarder) = test_processor();
        matchmaking
            .join("alice".to_string(), "click_speed".to_string(), 50, 2, None, serde_json::Value::Null)
            .await
            .unwrap();

        let event = Event::new(EventType::Disconnect, "connection_pool").with_username("alice".to_string());
        processor.handle_event(&event).await.unwrap();

        assert!(matchmaking.status("alice").await.is_none());
    }

    #[tokio::test]
    async fn disconnect_while_in_a_room_leaves_it() {
        let (processor, rooms, _matchmaking, _awarder) = test_processor();
        let settings = RoomSettings {
            name: "room".to_string(),
            min_players: 2,
            max_players: 4,
            is_private: false,
            password: None,
        };
        rooms
            .create_room("alice".to_string(), "click_speed".to_string(), settings)
            .await
            .unwrap();

        let event = Event::new(EventType::Disconnect, "connection_pool").with_username("alice".to_string());
        processor.handle_event(&event).await.unwrap();

        assert!(rooms.room_of("alice").is_none());
    }

    #[tokio::test]
    async fn game_end_awards_points_only_for_positive_scores() {
        let (processor, _rooms, _matchmaking, awarder) = test_processor();
        let room_id = crate::protocol::RoomId::new_v4();
        let players = serde_json::json!([
            { "username": "alice", "isReady": true, "isHost": true, "score": 100, "lastActionAt": null, "gameData": null },
            { "username": "bob", "isReady": true, "isHost": false, "score": 0, "lastActionAt": null, "gameData": null },
        ]);
        let event = Event::new(EventType::GameEnd, "room_manager")
            .with_room(room_id)
            .with_data(serde_json::json!({ "players": players, "gameType": "click_speed" }));

        processor.handle_event(&event).await.unwrap();

        let calls = awarder.calls.lock().unwrap();
        assert_eq!(calls.as_slice(), &[("alice".to_string(), 100)]);
    }
}

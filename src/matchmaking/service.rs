use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::MatchmakingConfig;
use crate::event_bus::{Event, EventBus, EventType};
use crate::metrics::ServerMetrics;
use crate::protocol::{CancelReason, MatchmakingPreferences, RoomSettings, Username};
use crate::room::RoomManager;

use super::error::MatchmakingError;
use super::pool::Pool;
use super::request::MatchmakingRequest;

/// Snapshot returned by `Status`: wait time, remaining time, pool size, and
/// a rough ETA. Not event-driven — this is a direct synchronous read the
/// caller answers a client's `matchmaking { action: status }` with.
#[derive(Debug, Clone, Copy)]
pub struct MatchmakingStatusInfo {
    pub wait_seconds: u64,
    pub remaining_seconds: u64,
    pub pool_size: usize,
    pub eta_seconds: u64,
}

enum GroupOutcome {
    Matched(Vec<MatchmakingRequest>),
    Expired(MatchmakingRequest),
    None,
}

/// Matchmaking Service (C4): one pool of pending requests per `gameType`,
/// a periodic tick that groups requests into rooms under a dynamically
/// expanding skill window, and a per-user cooldown after a recent match.
pub struct MatchmakingService {
    config: MatchmakingConfig,
    pools: Mutex<HashMap<String, Pool>>,
    user_index: DashMap<Username, String>,
    cooldowns: DashMap<Username, chrono::DateTime<Utc>>,
    bus: Arc<EventBus>,
    rooms: Arc<RoomManager>,
    metrics: Arc<ServerMetrics>,
}

impl MatchmakingService {
    pub fn new(
        config: MatchmakingConfig,
        bus: Arc<EventBus>,
        rooms: Arc<RoomManager>,
        metrics: Arc<ServerMetrics>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            pools: Mutex::new(HashMap::new()),
            user_index: DashMap::new(),
            cooldowns: DashMap::new(),
            bus,
            rooms,
            metrics,
        })
    }

    /// `JoinMatchmaking`.
    #[instrument(skip(self, preferences), fields(game_type = %game_type))]
    pub async fn join(
        &self,
        username: Username,
        game_type: String,
        skill_level: u8,
        preferred_players: u8,
        max_wait_secs: Option<u64>,
        preferences: MatchmakingPreferences,
    ) -> Result<(), MatchmakingError> {
        if self.rooms.room_of(&username).is_some() {
            return Err(MatchmakingError::AlreadyInRoom);
        }
        if let Some(last_match) = self.cooldowns.get(&username) {
            let cooldown = ChronoDuration::from_std(self.config.cooldown).unwrap_or_else(|_| ChronoDuration::zero());
            if Utc::now() - *last_match < cooldown {
                return Err(MatchmakingError::Cooldown);
            }
        }
        match self.user_index.entry(username.clone()) {
            Entry::Occupied(_) => return Err(MatchmakingError::AlreadyMatchmaking),
            Entry::Vacant(slot) => {
                slot.insert(game_type.clone());
            }
        }

        let max_wait = max_wait_secs
            .map(|secs| ChronoDuration::seconds(secs as i64))
            .unwrap_or_else(|| {
                ChronoDuration::from_std(self.config.default_max_wait).unwrap_or_else(|_| ChronoDuration::seconds(300))
            });
        let request = MatchmakingRequest::new(
            username.clone(),
            game_type.clone(),
            skill_level,
            preferred_players,
            max_wait,
            preferences,
        );

        {
            let mut pools = self.pools.lock().await;
            pools.entry(game_type.clone()).or_default().push(request);
        }
        self.metrics.matchmaking_requests_active.increment();

        let event = Event::new(EventType::MatchmakingStart, "matchmaking")
            .with_username(username)
            .with_data(serde_json::json!({ "status": "searching", "gameType": game_type }));
        self.bus.publish(event);
        Ok(())
    }

    /// `LeaveMatchmaking`.
    pub async fn leave(&self, username: &str) -> Result<(), MatchmakingError> {
        let Some((_, game_type)) = self.user_index.remove(username) else {
            return Err(MatchmakingError::NotMatchmaking);
        };
        let removed = {
            let mut pools = self.pools.lock().await;
            pools.get_mut(&game_type).and_then(|pool| pool.remove_by_username(username))
        };
        if removed.is_some() {
            self.metrics.matchmaking_requests_active.decrement();
            self.metrics.matchmaking_cancellations.increment();
        }

        let event = Event::new(EventType::MatchmakingCancel, "matchmaking")
            .with_username(username.to_string())
            .with_data(serde_json::json!({ "reason": CancelReason::UserCancelled }));
        self.bus.publish(event);
        Ok(())
    }

    /// `Status`.
    pub async fn status(&self, username: &str) -> Option<MatchmakingStatusInfo> {
        let game_type = self.user_index.get(username)?.clone();
        let pools = self.pools.lock().await;
        let pool = pools.get(&game_type)?;
        let request = pool.iter().find(|r| r.username == username)?;

        let wait_seconds = request.wait_seconds().max(0.0) as u64;
        let max_wait_seconds = request.max_wait.num_seconds().max(0) as u64;
        let remaining_seconds = max_wait_seconds.saturating_sub(wait_seconds);
        Some(MatchmakingStatusInfo {
            wait_seconds,
            remaining_seconds,
            pool_size: pool.len(),
            // Heuristic: assume the window keeps expanding at its current
            // rate and a match lands roughly halfway to the deadline.
            eta_seconds: remaining_seconds / 2,
        })
    }

    /// Background tick loop: every `tick_interval`, run the matching
    /// algorithm over every non-empty pool.
    pub async fn run_matching_loop(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.tick().await,
            }
        }
        debug!("matchmaking tick loop stopped");
    }

    async fn tick(&self) {
        let game_types: Vec<String> = {
            let pools = self.pools.lock().await;
            pools.keys().cloned().collect()
        };
        for game_type in game_types {
            self.tick_pool(&game_type).await;
        }
    }

    /// Drain every viable group and every expired anchor out of one pool,
    /// repeating until a tick yields neither (spec §4.4 steps 1-5).
    async fn tick_pool(&self, game_type: &str) {
        loop {
            let outcome = {
                let mut pools = self.pools.lock().await;
                let Some(pool) = pools.get_mut(game_type) else {
                    return;
                };
                self.select_group(pool)
            };
            match outcome {
                GroupOutcome::Matched(group) => self.form_match(game_type, group).await,
                GroupOutcome::Expired(request) => self.expire_request(request).await,
                GroupOutcome::None => break,
            }
        }
    }

    fn select_group(&self, pool: &mut Pool) -> GroupOutcome {
        let Some(anchor) = pool.anchor().cloned() else {
            return GroupOutcome::None;
        };
        let window = self.config.skill_window(anchor.wait_seconds());
        let max_group = self.config.max_players_per_match as usize;
        let min_group = self.config.min_players_per_match as usize;

        let mut matched_ids = vec![anchor.request_id];
        for request in pool.iter() {
            if request.request_id == anchor.request_id {
                continue;
            }
            if matched_ids.len() >= max_group {
                break;
            }
            if (request.skill_level as f64 - anchor.skill_level as f64).abs() <= window {
                matched_ids.push(request.request_id);
            }
        }

        if matched_ids.len() >= min_group {
            let chosen_size = (anchor.preferred_players as usize).clamp(min_group, matched_ids.len());
            matched_ids.truncate(chosen_size);
            let group = matched_ids
                .iter()
                .filter_map(|id| pool.remove_by_request_id(*id))
                .collect();
            return GroupOutcome::Matched(group);
        }

        if anchor.has_expired() {
            pool.remove_by_request_id(anchor.request_id);
            return GroupOutcome::Expired(anchor);
        }

        GroupOutcome::None
    }

    /// Create the room for `group`'s anchor (the first element), join the
    /// rest, and notify. A `CreateRoom` failure returns the whole group to
    /// the pool; an individual `JoinRoom` failure returns just that request.
    async fn form_match(&self, game_type: &str, group: Vec<MatchmakingRequest>) {
        let anchor = group[0].clone();
        let target_size = group.len() as u8;

        let settings = RoomSettings {
            name: format!("{game_type} match"),
            min_players: target_size,
            max_players: target_size,
            is_private: false,
            password: None,
        };

        let room_id = match self
            .rooms
            .create_room(anchor.username.clone(), game_type.to_string(), settings)
            .await
        {
            Ok(id) => id,
            Err(err) => {
                warn!(error = %err, "matchmaking could not create room, returning requests to pool");
                self.requeue(game_type, group).await;
                return;
            }
        };

        let mut joined = vec![anchor.clone()];
        let mut failed = Vec::new();
        for request in group.into_iter().skip(1) {
            match self.rooms.join_room(room_id, request.username.clone(), None).await {
                Ok(()) => joined.push(request),
                Err(err) => {
                    warn!(username = %request.username, error = %err, "matchmaking join failed, returning request to pool");
                    let event = Event::new(EventType::SystemError, "matchmaking")
                        .with_username(request.username.clone())
                        .with_data(serde_json::json!({ "message": err.to_string() }));
                    self.bus.publish(event);
                    failed.push(request);
                }
            }
        }
        if !failed.is_empty() {
            self.requeue(game_type, failed).await;
        }

        let average_skill =
            joined.iter().map(|r| r.skill_level as f64).sum::<f64>() / joined.len() as f64;
        let now = Utc::now();
        for request in &joined {
            self.user_index.remove(&request.username);
            self.cooldowns.insert(request.username.clone(), now);
            self.metrics.matchmaking_requests_active.decrement();
            let event = Event::new(EventType::MatchFound, "matchmaking")
                .with_username(request.username.clone())
                .with_room(room_id)
                .with_data(serde_json::json!({
                    "roomId": room_id,
                    "gameType": game_type,
                    "playerCount": joined.len(),
                    "averageSkill": average_skill,
                }));
            self.bus.publish(event);
        }
        self.metrics.matches_made.increment();
        info!(room_id = %room_id, game_type, player_count = joined.len(), "matchmaking formed a room");
    }

    async fn requeue(&self, game_type: &str, group: Vec<MatchmakingRequest>) {
        let mut pools = self.pools.lock().await;
        let pool = pools.entry(game_type.to_string()).or_default();
        for request in group {
            pool.push(request);
        }
    }

    async fn expire_request(&self, request: MatchmakingRequest) {
        self.user_index.remove(&request.username);
        self.metrics.matchmaking_requests_active.decrement();
        self.metrics.matchmaking_timeouts.increment();
        let event = Event::new(EventType::MatchTimeout, "matchmaking")
            .with_username(request.username.clone())
            .with_data(serde_json::json!({ "reason": CancelReason::Timeout }));
        self.bus.publish(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BusConfig, ConnectionConfig, RoomConfig};
    use crate::connection::ConnectionPool;
    use crate::engine::StaticGameEngine;

    fn test_service() -> (Arc<MatchmakingService>, Arc<EventBus>) {
        let metrics = Arc::new(ServerMetrics::new());
        let bus = EventBus::new(BusConfig::default(), metrics.clone());
        let pool = Arc::new(ConnectionPool::new(ConnectionConfig::default(), metrics.clone(), bus.clone()));
        let engine = Arc::new(StaticGameEngine::new(&["click_speed".to_string()], 2, 8));
        let rooms = RoomManager::new(RoomConfig::default(), bus.clone(), pool, metrics.clone(), engine);
        let mut config = MatchmakingConfig::default();
        config.min_players_per_match = 2;
        let service = MatchmakingService::new(config, bus.clone(), rooms, metrics);
        (service, bus)
    }

    #[tokio::test]
    async fn join_then_leave_returns_pool_to_empty() {
        let (service, _bus) = test_service();
        service
            .join("alice".to_string(), "click_speed".to_string(), 50, 2, None, serde_json::Value::Null)
            .await
            .unwrap();
        assert!(service.status("alice").await.is_some());

        service.leave("alice").await.unwrap();
        assert!(service.status("alice").await.is_none());
    }

    #[tokio::test]
    async fn duplicate_join_is_rejected() {
        let (service, _bus) = test_service();
        service
            .join("alice".to_string(), "click_speed".to_string(), 50, 2, None, serde_json::Value::Null)
            .await
            .unwrap();
        let err = service
            .join("alice".to_string(), "click_speed".to_string(), 50, 2, None, serde_json::Value::Null)
            .await
            .unwrap_err();
        assert_eq!(err, MatchmakingError::AlreadyMatchmaking);
    }

    #[tokio::test]
    async fn two_close_skill_requests_form_a_match_on_tick() {
        let (service, bus) = test_service();
        let (_id, mut rx) = bus.subscribe("test", vec![EventType::MatchFound], None, None);
        let cancel = CancellationToken::new();
        let distributor = tokio::spawn(bus.clone().run_distributor(cancel.clone()));

        service
            .join("alice".to_string(), "click_speed".to_string(), 50, 2, None, serde_json::Value::Null)
            .await
            .unwrap();
        service
            .join("bob".to_string(), "click_speed".to_string(), 52, 2, None, serde_json::Value::Null)
            .await
            .unwrap();

        service.tick().await;

        let event = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for match_found")
            .expect("channel closed");
        assert_eq!(event.event_type, EventType::MatchFound);
        assert!(service.status("alice").await.is_none());
        assert!(service.status("bob").await.is_none());

        cancel.cancel();
        let _ = distributor.await;
    }

    #[tokio::test]
    async fn lone_request_past_its_deadline_times_out() {
        let (service, _bus) = test_service();
        service
            .join("alice".to_string(), "click_speed".to_string(), 50, 2, Some(0), serde_json::Value::Null)
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        service.tick().await;

        assert!(service.status("alice").await.is_none());
        assert_eq!(service.metrics.matchmaking_timeouts.get(), 1);
    }
}

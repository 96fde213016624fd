use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::RoomConfig;
use crate::connection::ConnectionPool;
use crate::engine::SharedMiniGameEngine;
use crate::event_bus::{Event, EventBus, EventType};
use crate::metrics::ServerMetrics;
use crate::protocol::{Player, RoomId, RoomSettings, RoomState, Username};

use super::error::RoomError;
use super::room::Room;

/// One room plus the per-room event channel its mutating operations feed.
/// An internal worker drains `event_rx` into the bus, which serializes
/// delivery order for everything this room produces (spec §4.3, §5).
struct RoomHandle {
    room: Mutex<Room>,
    event_tx: mpsc::Sender<Event>,
}

/// Room Manager (C3): authoritative room state. A coarse map-level lock
/// (the `DashMap`'s internal sharding) guards lookup/insert/delete; each
/// room's own mutex guards field mutation. The manager never holds both
/// simultaneously in any order but manager-then-room.
pub struct RoomManager {
    config: RoomConfig,
    rooms: DashMap<RoomId, Arc<RoomHandle>>,
    user_room_index: DashMap<Username, RoomId>,
    public_rooms: DashSet<RoomId>,
    bus: Arc<EventBus>,
    pool: Arc<ConnectionPool>,
    metrics: Arc<ServerMetrics>,
    engine: SharedMiniGameEngine,
}

impl RoomManager {
    pub fn new(
        config: RoomConfig,
        bus: Arc<EventBus>,
        pool: Arc<ConnectionPool>,
        metrics: Arc<ServerMetrics>,
        engine: SharedMiniGameEngine,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            rooms: DashMap::new(),
            user_room_index: DashMap::new(),
            public_rooms: DashSet::new(),
            bus,
            pool,
            metrics,
            engine,
        })
    }

    pub fn room_of(&self, username: &str) -> Option<RoomId> {
        self.user_room_index.get(username).map(|e| *e.value())
    }

    pub fn active_room_count(&self) -> usize {
        self.rooms.len()
    }

    fn spawn_room(&self, room: Room) -> Arc<RoomHandle> {
        let (event_tx, mut event_rx) = mpsc::channel(self.config.event_channel_capacity);
        let bus = self.bus.clone();
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                bus.publish(event);
            }
        });
        Arc::new(RoomHandle {
            room: Mutex::new(room),
            event_tx,
        })
    }

    /// `CreateRoom`: rejects a host already in a room or an unsupported
    /// game type, then allocates the room and reserves the indexes.
    #[instrument(skip(self, settings), fields(game_type = %game_type))]
    pub async fn create_room(
        &self,
        host: Username,
        game_type: String,
        settings: RoomSettings,
    ) -> Result<RoomId, RoomError> {
        if !self.engine.list_game_types().contains_key(&game_type) {
            return Err(RoomError::UnsupportedGameType);
        }

        let room_id = RoomId::new_v4();
        match self.user_room_index.entry(host.clone()) {
            Entry::Occupied(_) => return Err(RoomError::AlreadyInRoom),
            Entry::Vacant(slot) => {
                slot.insert(room_id);
            }
        }

        let room = match Room::new(room_id, game_type.clone(), host.clone(), settings) {
            Ok(room) => room,
            Err(err) => {
                self.user_room_index.remove(&host);
                return Err(err);
            }
        };
        let is_private = room.is_private;
        let handle = self.spawn_room(room);
        self.rooms.insert(room_id, handle.clone());
        if !is_private {
            self.public_rooms.insert(room_id);
        }
        self.metrics.rooms_created.increment();
        self.metrics.rooms_active.increment();

        self.pool.attach_room(&host, room_id).await;

        let event = Event::new(EventType::RoomCreate, "room_manager")
            .with_room(room_id)
            .with_username(host.clone())
            .with_data(serde_json::json!({ "gameType": game_type, "host": host }));
        let _ = handle.event_tx.try_send(event);

        info!(room_id = %room_id, host = %host, "room created");
        Ok(room_id)
    }

    /// `JoinRoom`.
    pub async fn join_room(
        &self,
        room_id: RoomId,
        user: Username,
        password: Option<String>,
    ) -> Result<(), RoomError> {
        match self.user_room_index.entry(user.clone()) {
            Entry::Occupied(_) => return Err(RoomError::AlreadyInRoom),
            Entry::Vacant(slot) => {
                slot.insert(room_id);
            }
        }

        let Some(handle) = self.rooms.get(&room_id).map(|e| e.value().clone()) else {
            self.user_room_index.remove(&user);
            return Err(RoomError::RoomNotFound);
        };

        let player = {
            let mut room = handle.room.lock().await;
            if let Err(err) = room.join(user.clone(), password.as_deref()) {
                drop(room);
                self.user_room_index.remove(&user);
                return Err(err);
            }
            let player = room.members.get(&user).cloned();
            let event = Event::new(EventType::RoomJoin, "room_manager")
                .with_room(room_id)
                .with_username(user.clone())
                .with_data(serde_json::json!({ "player": player }));
            let _ = handle.event_tx.try_send(event);
            player
        };
        let _ = player;

        self.pool.attach_room(&user, room_id).await;
        Ok(())
    }

    /// `LeaveRoom`: removes the member, migrates the host if needed, and
    /// closes the room if it's now empty.
    pub async fn leave_room(&self, room_id: RoomId, user: &str) -> Result<(), RoomError> {
        let Some(handle) = self.rooms.get(&room_id).map(|e| e.value().clone()) else {
            return Err(RoomError::RoomNotFound);
        };

        let outcome = {
            let mut room = handle.room.lock().await;
            let outcome = room.leave(user)?;

            let leave_event = Event::new(EventType::RoomLeave, "room_manager")
                .with_room(room_id)
                .with_username(user.to_string());
            let _ = handle.event_tx.try_send(leave_event);

            if let Some(new_host) = &outcome.new_host {
                self.metrics.host_migrations.increment();
                let host_event = Event::new(EventType::HostChanged, "room_manager")
                    .with_room(room_id)
                    .with_data(serde_json::json!({ "newHost": new_host }));
                let _ = handle.event_tx.try_send(host_event);
            }
            if outcome.room_closed {
                room.close();
                let close_event = Event::new(EventType::RoomClose, "room_manager")
                    .with_room(room_id)
                    .with_data(serde_json::json!({ "reason": "empty" }));
                let _ = handle.event_tx.try_send(close_event);
            }
            outcome
        };

        self.user_room_index.remove(user);
        self.pool.detach_room(user).await;

        if outcome.room_closed {
            self.rooms.remove(&room_id);
            self.public_rooms.remove(&room_id);
            self.metrics.rooms_active.decrement();
            self.metrics.rooms_closed.increment();
        }

        Ok(())
    }

    /// `SetReady`.
    pub async fn set_ready(&self, room_id: RoomId, user: &str, ready: bool) -> Result<(), RoomError> {
        let handle = self.room_handle(room_id)?;
        let mut room = handle.room.lock().await;
        room.set_ready(user, ready)?;

        let event_type = if ready {
            EventType::PlayerReady
        } else {
            EventType::PlayerNotReady
        };
        let event = Event::new(event_type, "room_manager")
            .with_room(room_id)
            .with_username(user.to_string());
        let _ = handle.event_tx.try_send(event);
        Ok(())
    }

    /// `StartGame`.
    pub async fn start_game(&self, room_id: RoomId, user: &str) -> Result<(), RoomError> {
        let handle = self.room_handle(room_id)?;
        let mut room = handle.room.lock().await;
        room.start_game(user)?;
        let event = Event::new(EventType::GameStart, "room_manager")
            .with_room(room_id)
            .with_data(serde_json::json!({ "startTime": room.start_time }));
        let _ = handle.event_tx.try_send(event);
        Ok(())
    }

    /// `ProcessAction`: forwards the opaque action payload as `game_action`.
    /// Whether a `game_update` is also broadcast is left to the game-rule
    /// collaborator (open question, spec §9) — the core never does it
    /// automatically.
    pub async fn process_action(
        &self,
        room_id: RoomId,
        user: &str,
        action: serde_json::Value,
    ) -> Result<(), RoomError> {
        let handle = self.room_handle(room_id)?;
        let mut room = handle.room.lock().await;
        room.process_action(user)?;
        let event = Event::new(EventType::GameAction, "room_manager")
            .with_room(room_id)
            .with_username(user.to_string())
            .with_data(action);
        let _ = handle.event_tx.try_send(event);
        Ok(())
    }

    /// `EndGame`: stamps `endTime` and emits the final per-player state.
    pub async fn end_game(&self, room_id: RoomId) -> Result<Vec<Player>, RoomError> {
        let handle = self.room_handle(room_id)?;
        let mut room = handle.room.lock().await;
        room.end_game()?;
        let players: Vec<Player> = room.members.values().cloned().collect();
        let event = Event::new(EventType::GameEnd, "room_manager")
            .with_room(room_id)
            .with_data(serde_json::json!({
                "players": players,
                "endTime": room.end_time,
                "gameType": room.game_type,
            }));
        let _ = handle.event_tx.try_send(event);
        Ok(players)
    }

    fn room_handle(&self, room_id: RoomId) -> Result<Arc<RoomHandle>, RoomError> {
        self.rooms
            .get(&room_id)
            .map(|e| e.value().clone())
            .ok_or(RoomError::RoomNotFound)
    }

    /// Background sweep: every `sweep_interval`, close rooms that are
    /// empty or have exceeded `inactivity_timeout` since `lastActivity`.
    pub async fn run_inactivity_sweep(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.sweep_interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.sweep_once().await,
            }
        }
        debug!("room inactivity sweep stopped");
    }

    async fn sweep_once(&self) {
        let timeout = chrono::Duration::from_std(self.config.inactivity_timeout)
            .unwrap_or_else(|_| chrono::Duration::zero());

        let stale: Vec<RoomId> = {
            let mut ids = Vec::new();
            for entry in self.rooms.iter() {
                let room_id = *entry.key();
                let room = entry.value().room.lock().await;
                if room.is_inactive(timeout) {
                    ids.push(room_id);
                }
            }
            ids
        };

        for room_id in stale {
            let Some((_, handle)) = self.rooms.remove(&room_id) else {
                continue;
            };
            self.public_rooms.remove(&room_id);

            let members: Vec<Username> = {
                let mut room = handle.room.lock().await;
                room.close();
                room.members.keys().cloned().collect()
            };
            for username in &members {
                self.user_room_index.remove(username);
                self.pool.detach_room(username).await;
            }

            let event = Event::new(EventType::RoomClose, "room_manager")
                .with_room(room_id)
                .with_data(serde_json::json!({ "reason": "inactivity" }));
            let _ = handle.event_tx.try_send(event);

            self.metrics.rooms_active.decrement();
            self.metrics.rooms_closed.increment();
            warn!(room_id = %room_id, "room closed by inactivity sweep");
        }
    }
}

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::event_bus::{Event, EventBus, EventType};
use crate::metrics::ServerMetrics;
use crate::protocol::{ConnectionId, ConnectionState, Envelope, RoomId, Username};

use super::connection::{Connection, TrySendError};

/// Owns every live client session. Registration, room attachment, and
/// fan-out are lock-free from the caller's perspective (DashMap shards its
/// internal locking); per-connection delivery never blocks on a slow peer.
pub struct ConnectionPool {
    config: ConnectionConfig,
    by_username: DashMap<Username, Arc<Connection>>,
    id_to_username: DashMap<ConnectionId, Username>,
    room_index: DashMap<RoomId, DashSet<Username>>,
    metrics: Arc<ServerMetrics>,
    bus: Arc<EventBus>,
}

impl ConnectionPool {
    pub fn new(config: ConnectionConfig, metrics: Arc<ServerMetrics>, bus: Arc<EventBus>) -> Self {
        Self {
            config,
            by_username: DashMap::new(),
            id_to_username: DashMap::new(),
            room_index: DashMap::new(),
            metrics,
            bus,
        }
    }

    /// Attach a transport for `username`. If a Connection for the same
    /// username already exists it is closed first (last-writer-wins):
    /// this avoids orphaned ghosts after a client reconnects without the
    /// old socket ever seeing a close frame.
    pub async fn register(&self, username: Username) -> (Arc<Connection>, mpsc::Receiver<Arc<Envelope>>) {
        if let Some((_, old)) = self.by_username.remove(&username) {
            self.id_to_username.remove(&old.id);
            old.set_state(ConnectionState::Closed);
            self.detach_room_of(&old).await;
            debug!(username = %old.username, "replaced existing connection (last-writer-wins)");
        }
        let (conn, rx) = Connection::new(username.clone(), self.config.outbound_queue_capacity);
        let conn = Arc::new(conn);
        self.id_to_username.insert(conn.id, username.clone());
        self.by_username.insert(username.clone(), conn.clone());
        self.metrics.connections_active.increment();
        self.metrics.connections_total.increment();
        self.bus.publish(Event::new(EventType::Connect, "connection_pool").with_username(username));
        (conn, rx)
    }

    /// Closes the transport and removes all indexes. Emits `disconnect` so
    /// the Event Processor (C5) can react (leave matchmaking, leave room).
    pub async fn unregister(&self, connection_id: ConnectionId) {
        let Some((_, username)) = self.id_to_username.remove(&connection_id) else {
            return;
        };
        if let Some((_, conn)) = self.by_username.remove(&username) {
            conn.set_state(ConnectionState::Closed);
            self.detach_room_of(&conn).await;
            self.metrics.connections_active.decrement();
            self.bus
                .publish(Event::new(EventType::Disconnect, "connection_pool").with_username(username));
        }
    }

    pub fn get(&self, username: &str) -> Option<Arc<Connection>> {
        self.by_username.get(username).map(|e| e.value().clone())
    }

    pub async fn attach_room(&self, username: &str, room_id: RoomId) {
        if let Some(conn) = self.get(username) {
            conn.set_room_id(Some(room_id)).await;
            self.room_index
                .entry(room_id)
                .or_default()
                .insert(username.to_string());
        }
    }

    pub async fn detach_room(&self, username: &str) {
        if let Some(conn) = self.get(username) {
            self.detach_room_of(&conn).await;
        }
    }

    async fn detach_room_of(&self, conn: &Connection) {
        if let Some(room_id) = conn.room_id().await {
            if let Some(members) = self.room_index.get(&room_id) {
                members.remove(&conn.username);
            }
            conn.set_room_id(None).await;
        }
    }

    /// Non-blocking; returns `false` when the user isn't connected.
    pub fn send_to_user(&self, username: &str, envelope: Arc<Envelope>) -> bool {
        let Some(conn) = self.get(username) else {
            return false;
        };
        self.deliver(&conn, envelope)
    }

    /// Fan out to every member of a room, skipping `exclude` if set.
    /// Never blocks on a slow receiver: a full queue evicts that
    /// connection and delivery continues to the rest.
    pub fn send_to_room(&self, room_id: RoomId, envelope: Arc<Envelope>, exclude: Option<&str>) {
        let Some(members) = self.room_index.get(&room_id) else {
            return;
        };
        for username in members.iter() {
            if exclude == Some(username.as_str()) {
                continue;
            }
            if let Some(conn) = self.get(&username) {
                self.deliver(&conn, envelope.clone());
            }
        }
    }

    pub fn broadcast(&self, envelope: Arc<Envelope>) {
        for entry in self.by_username.iter() {
            self.deliver(entry.value(), envelope.clone());
        }
    }

    fn deliver(&self, conn: &Connection, envelope: Arc<Envelope>) -> bool {
        match conn.try_send(envelope) {
            Ok(()) => true,
            Err(TrySendError::QueueFull) => {
                warn!(username = %conn.username, "outbound queue full, evicting slow consumer");
                conn.set_state(ConnectionState::Closing);
                self.metrics.slow_consumer_evictions.increment();
                false
            }
            Err(TrySendError::Closed) => false,
        }
    }

    pub fn active_count(&self) -> usize {
        self.by_username.len()
    }

    /// Background reaper: every `reap_interval`, unregister connections
    /// idle longer than `idle_timeout`. Connections marked `Closing` by
    /// slow-consumer eviction are swept up here too.
    pub async fn run_reaper(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.reap_interval);
        let idle_timeout = chrono::Duration::from_std(self.config.idle_timeout)
            .unwrap_or(chrono::Duration::zero());
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let stale: Vec<ConnectionId> = self
                        .by_username
                        .iter()
                        .filter(|e| {
                            e.value().state() != ConnectionState::Open
                                || e.value().idle_for() > idle_timeout
                        })
                        .map(|e| e.value().id)
                        .collect();
                    for id in stale {
                        self.metrics.connections_reaped_idle.increment();
                        self.clone().unregister(id).await;
                    }
                }
            }
        }
        info!("connection pool reaper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BusConfig, ConnectionConfig};

    fn test_pool() -> Arc<ConnectionPool> {
        let metrics = Arc::new(ServerMetrics::new());
        let bus = EventBus::new(BusConfig::default(), metrics.clone());
        Arc::new(ConnectionPool::new(ConnectionConfig::default(), metrics, bus))
    }

    #[tokio::test]
    async fn reaper_evicts_idle_connections_and_counts_them() {
        let metrics = Arc::new(ServerMetrics::new());
        let bus = EventBus::new(BusConfig::default(), metrics.clone());
        let mut config = ConnectionConfig::default();
        config.idle_timeout = std::time::Duration::from_millis(1);
        config.reap_interval = std::time::Duration::from_millis(10);
        let pool = Arc::new(ConnectionPool::new(config, metrics.clone(), bus));

        let (_conn, _rx) = pool.register("alice".to_string()).await;
        let cancel = CancellationToken::new();
        let reaper = tokio::spawn(pool.clone().run_reaper(cancel.clone()));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        cancel.cancel();
        let _ = reaper.await;

        assert_eq!(pool.active_count(), 0);
        assert_eq!(metrics.connections_reaped_idle.get(), 1);
    }

    #[tokio::test]
    async fn register_then_get_round_trips() {
        let pool = test_pool();
        let (conn, _rx) = pool.register("alice".to_string()).await;
        assert_eq!(pool.get("alice").unwrap().id, conn.id);
        assert_eq!(pool.active_count(), 1);
    }

    #[tokio::test]
    async fn re_registering_same_username_closes_the_old_connection() {
        let pool = test_pool();
        let (first, _rx1) = pool.register("alice".to_string()).await;
        let (second, _rx2) = pool.register("alice".to_string()).await;
        assert_eq!(first.state(), ConnectionState::Closed);
        assert_eq!(pool.get("alice").unwrap().id, second.id);
        assert_eq!(pool.active_count(), 1);
    }

    #[tokio::test]
    async fn room_fan_out_skips_excluded_and_absent_members() {
        let pool = test_pool();
        let (_a, mut rx_a) = pool.register("alice".to_string()).await;
        let (_b, mut rx_b) = pool.register("bob".to_string()).await;
        let room_id = RoomId::new_v4();
        pool.attach_room("alice", room_id).await;
        pool.attach_room("bob", room_id).await;

        let envelope = Arc::new(Envelope::new("game_action", serde_json::Value::Null));
        pool.send_to_room(room_id, envelope, Some("alice"));

        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn full_queue_is_evicted_without_blocking_other_recipients() {
        let pool = test_pool();
        let (_slow, _rx_slow) = pool.register("slow".to_string()).await;
        let (_fast, mut rx_fast) = pool.register("fast".to_string()).await;

        for _ in 0..super::super::connection::OUTBOUND_QUEUE_CAPACITY {
            let envelope = Arc::new(Envelope::new("tick", serde_json::Value::Null));
            pool.send_to_user("slow", envelope);
        }
        let envelope = Arc::new(Envelope::new("tick", serde_json::Value::Null));
        pool.broadcast(envelope);

        assert_eq!(pool.get("slow").unwrap().state(), ConnectionState::Closing);
        assert!(rx_fast.try_recv().is_ok());
    }
}

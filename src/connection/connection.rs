use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use crate::protocol::{ConnectionId, ConnectionState, Envelope, RoomId, Username};

/// Capacity of a single connection's outbound queue. Sized generously
/// enough to absorb a burst without the producer ever blocking; once full,
/// the connection is marked for eviction rather than back-pressuring.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

fn state_from_u8(v: u8) -> ConnectionState {
    match v {
        0 => ConnectionState::Open,
        1 => ConnectionState::Closing,
        _ => ConnectionState::Closed,
    }
}

fn state_to_u8(s: ConnectionState) -> u8 {
    match s {
        ConnectionState::Open => 0,
        ConnectionState::Closing => 1,
        ConnectionState::Closed => 2,
    }
}

/// A single live client session. Transports (the WebSocket collaborator)
/// hold the receiving half of `outbound` and forward frames read from
/// `inbound_closed`/the socket into the pool via its public API; this
/// struct only owns the bookkeeping the core components need.
pub struct Connection {
    pub id: ConnectionId,
    pub username: Username,
    state: AtomicU8,
    /// Milliseconds since epoch of the last successful read or pong.
    last_activity_ms: AtomicI64,
    room_id: RwLock<Option<RoomId>>,
    outbound_tx: mpsc::Sender<Arc<Envelope>>,
}

impl Connection {
    pub fn new(username: Username, outbound_capacity: usize) -> (Self, mpsc::Receiver<Arc<Envelope>>) {
        let (tx, rx) = mpsc::channel(outbound_capacity);
        let conn = Self {
            id: ConnectionId::new_v4(),
            username,
            state: AtomicU8::new(state_to_u8(ConnectionState::Open)),
            last_activity_ms: AtomicI64::new(chrono::Utc::now().timestamp_millis()),
            room_id: RwLock::new(None),
            outbound_tx: tx,
        };
        (conn, rx)
    }

    pub fn state(&self) -> ConnectionState {
        state_from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: ConnectionState) {
        self.state.store(state_to_u8(state), Ordering::Release);
    }

    pub fn touch(&self) {
        self.last_activity_ms
            .store(chrono::Utc::now().timestamp_millis(), Ordering::Release);
    }

    pub fn idle_for(&self) -> chrono::Duration {
        let last = self.last_activity_ms.load(Ordering::Acquire);
        let now = chrono::Utc::now().timestamp_millis();
        chrono::Duration::milliseconds((now - last).max(0))
    }

    pub async fn room_id(&self) -> Option<RoomId> {
        *self.room_id.read().await
    }

    pub async fn set_room_id(&self, room_id: Option<RoomId>) {
        *self.room_id.write().await = room_id;
    }

    /// Enqueue a frame for delivery. Never blocks: a full queue means the
    /// connection is a slow consumer, and the caller (the pool) evicts it
    /// instead of waiting.
    pub fn try_send(&self, envelope: Arc<Envelope>) -> Result<(), TrySendError> {
        if self.state() != ConnectionState::Open {
            return Err(TrySendError::Closed);
        }
        self.outbound_tx
            .try_send(envelope)
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => TrySendError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => TrySendError::Closed,
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrySendError {
    QueueFull,
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_connection_starts_open_and_touched() {
        let (conn, _rx) = Connection::new("alice".to_string(), OUTBOUND_QUEUE_CAPACITY);
        assert_eq!(conn.state(), ConnectionState::Open);
        assert!(conn.idle_for() < chrono::Duration::seconds(1));
        assert_eq!(conn.room_id().await, None);
    }

    #[tokio::test]
    async fn closing_a_connection_rejects_further_sends() {
        let (conn, _rx) = Connection::new("alice".to_string(), OUTBOUND_QUEUE_CAPACITY);
        conn.set_state(ConnectionState::Closing);
        let envelope = Arc::new(Envelope::new("ping", serde_json::Value::Null));
        assert_eq!(conn.try_send(envelope), Err(TrySendError::Closed));
    }

    #[tokio::test]
    async fn full_outbound_queue_reports_queue_full() {
        let (conn, _rx) = Connection::new("slow".to_string(), OUTBOUND_QUEUE_CAPACITY);
        for _ in 0..OUTBOUND_QUEUE_CAPACITY {
            let envelope = Arc::new(Envelope::new("ping", serde_json::Value::Null));
            conn.try_send(envelope).unwrap();
        }
        let envelope = Arc::new(Envelope::new("ping", serde_json::Value::Null));
        assert_eq!(conn.try_send(envelope), Err(TrySendError::QueueFull));
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::protocol::{RoomId, SubscriptionId, Username};

use super::event::{Event, EventType};

/// Explicit handler interface for subscribers that want a callback instead
/// of (or in addition to) draining a delivery channel — the event
/// processor (C5) and the client bridge are both handlers.
#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_types(&self) -> &[EventType];

    async fn handle_event(&self, event: &Event) -> anyhow::Result<()>;
}

/// A bus consumer. `event_types` / `room_filter` / `user_filter` are the
/// three orthogonal filters from the distribution algorithm: a candidate
/// event must satisfy all that are set.
pub struct Subscription {
    pub id: SubscriptionId,
    pub subscriber: String,
    pub event_types: Vec<EventType>,
    pub room_filter: Option<RoomId>,
    pub user_filter: Option<Username>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    active: AtomicBool,
    /// `None` for handler-only subscribers (e.g. the client bridge) that
    /// never drain a channel themselves.
    sender: Option<mpsc::Sender<Arc<Event>>>,
    handler: Option<Arc<dyn EventHandler>>,
}

impl Subscription {
    pub fn new(
        subscriber: impl Into<String>,
        event_types: Vec<EventType>,
        room_filter: Option<RoomId>,
        user_filter: Option<Username>,
        sender: Option<mpsc::Sender<Arc<Event>>>,
        handler: Option<Arc<dyn EventHandler>>,
    ) -> Self {
        Self {
            id: SubscriptionId::new_v4(),
            subscriber: subscriber.into(),
            event_types,
            room_filter,
            user_filter,
            created_at: chrono::Utc::now(),
            active: AtomicBool::new(true),
            sender,
            handler,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Whether `event` matches every filter this subscription declared.
    pub fn matches(&self, event: &Event) -> bool {
        if !self.event_types.contains(&event.event_type) {
            return false;
        }
        if let Some(room_filter) = self.room_filter {
            if event.room_id != Some(room_filter) {
                return false;
            }
        }
        if let Some(user_filter) = &self.user_filter {
            if event.username.as_deref() != Some(user_filter.as_str()) {
                return false;
            }
        }
        true
    }

    /// Non-blocking delivery to the subscription's channel. Returns
    /// `false` (and leaves the event undelivered) on a full channel, a
    /// closed receiver, or when this subscription has no channel at all —
    /// the distributor never blocks on a slow subscriber.
    pub fn try_deliver(&self, event: Arc<Event>) -> bool {
        match &self.sender {
            Some(sender) => sender.try_send(event).is_ok(),
            None => false,
        }
    }

    pub fn handler(&self) -> Option<&Arc<dyn EventHandler>> {
        self.handler.as_ref()
    }

    /// Whether this subscription has a delivery channel at all — a
    /// handler-only subscriber (e.g. the client bridge) never does, and a
    /// full/closed channel is a meaningfully different outcome from "no
    /// channel to begin with" for the subscriber-full drop counter.
    pub fn has_channel(&self) -> bool {
        self.sender.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::event::Event;

    fn sub(event_types: Vec<EventType>, room: Option<RoomId>, user: Option<Username>) -> (Subscription, mpsc::Receiver<Arc<Event>>) {
        let (tx, rx) = mpsc::channel(8);
        (
            Subscription::new("test", event_types, room, user, Some(tx), None),
            rx,
        )
    }

    #[test]
    fn matches_requires_type_membership() {
        let (s, _rx) = sub(vec![EventType::RoomJoin], None, None);
        let event = Event::new(EventType::RoomLeave, "room_manager");
        assert!(!s.matches(&event));
    }

    #[test]
    fn matches_enforces_room_filter() {
        let room_id = RoomId::new_v4();
        let (s, _rx) = sub(vec![EventType::RoomJoin], Some(room_id), None);
        let unrelated = Event::new(EventType::RoomJoin, "room_manager").with_room(RoomId::new_v4());
        let matching = Event::new(EventType::RoomJoin, "room_manager").with_room(room_id);
        assert!(!s.matches(&unrelated));
        assert!(s.matches(&matching));
    }
}

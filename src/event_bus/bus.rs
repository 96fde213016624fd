use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::BusConfig;
use crate::metrics::ServerMetrics;
use crate::protocol::{RoomId, SubscriptionId, Username};

use super::event::{Event, EventType};
use super::subscription::{EventHandler, Subscription};

/// Typed publish/subscribe core (C2). Three orthogonal indexes (type,
/// room, user) let `distribute` narrow a global subscriber set down to
/// the handful of candidates an event could possibly match without
/// scanning every subscription.
pub struct EventBus {
    config: BusConfig,
    metrics: Arc<ServerMetrics>,
    inbound_tx: mpsc::Sender<Event>,
    inbound_rx: Mutex<Option<mpsc::Receiver<Event>>>,
    subscriptions: DashMap<SubscriptionId, Arc<Subscription>>,
    type_index: DashMap<EventType, DashSet<SubscriptionId>>,
    room_index: DashMap<RoomId, DashSet<SubscriptionId>>,
    user_index: DashMap<Username, DashSet<SubscriptionId>>,
    history: Mutex<VecDeque<Arc<Event>>>,
}

impl EventBus {
    pub fn new(config: BusConfig, metrics: Arc<ServerMetrics>) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(config.inbound_capacity);
        Arc::new(Self {
            config,
            metrics,
            inbound_tx: tx,
            inbound_rx: Mutex::new(Some(rx)),
            subscriptions: DashMap::new(),
            type_index: DashMap::new(),
            room_index: DashMap::new(),
            user_index: DashMap::new(),
            history: Mutex::new(VecDeque::new()),
        })
    }

    /// Enqueue `event` for distribution. Non-blocking: a full inbound
    /// channel drops the event and increments a counter rather than
    /// back-pressuring the publisher (spec §4.2, §7).
    pub fn publish(&self, event: Event) {
        if self.inbound_tx.try_send(event).is_err() {
            warn!("event bus inbound channel full, dropping event");
            self.metrics.events_dropped_inbound_full.increment();
        } else {
            self.metrics.events_published.increment();
        }
    }

    /// Register a channel-based subscriber. Returns the subscription id
    /// and the receiving half; `event_types` must be non-empty for the
    /// subscription to ever match anything.
    pub fn subscribe(
        &self,
        subscriber: impl Into<String>,
        event_types: Vec<EventType>,
        room_filter: Option<RoomId>,
        user_filter: Option<Username>,
    ) -> (SubscriptionId, mpsc::Receiver<Arc<Event>>) {
        let (tx, rx) = mpsc::channel(self.config.subscriber_capacity);
        let id = self.insert_subscription(subscriber, event_types, room_filter, user_filter, Some(tx), None);
        (id, rx)
    }

    /// Register a handler-based subscriber (no channel to drain): the
    /// handler's `handle_event` is invoked for every matching event.
    pub fn subscribe_handler(
        &self,
        subscriber: impl Into<String>,
        handler: Arc<dyn EventHandler>,
        room_filter: Option<RoomId>,
        user_filter: Option<Username>,
    ) -> SubscriptionId {
        let event_types = handler.event_types().to_vec();
        self.insert_subscription(subscriber, event_types, room_filter, user_filter, None, Some(handler))
    }

    #[allow(clippy::too_many_arguments)]
    fn insert_subscription(
        &self,
        subscriber: impl Into<String>,
        event_types: Vec<EventType>,
        room_filter: Option<RoomId>,
        user_filter: Option<Username>,
        sender: Option<mpsc::Sender<Arc<Event>>>,
        handler: Option<Arc<dyn EventHandler>>,
    ) -> SubscriptionId {
        let subscription = Arc::new(Subscription::new(
            subscriber,
            event_types.clone(),
            room_filter,
            user_filter.clone(),
            sender,
            handler,
        ));
        let id = subscription.id;

        for event_type in &event_types {
            self.type_index.entry(*event_type).or_default().insert(id);
        }
        if let Some(room_id) = room_filter {
            self.room_index.entry(room_id).or_default().insert(id);
        }
        if let Some(username) = user_filter {
            self.user_index.entry(username).or_default().insert(id);
        }
        self.subscriptions.insert(id, subscription);
        self.metrics.subscriptions_active.increment();
        id
    }

    /// Deactivate a subscription immediately (no further deliveries);
    /// the entry is fully purged from the indexes by the next cleanup
    /// tick, once it has aged past `subscription_ttl`.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if let Some(entry) = self.subscriptions.get(&id) {
            entry.deactivate();
            self.metrics.subscriptions_active.decrement();
        }
    }

    /// Run the distributor loop. Owns the inbound receiver for the
    /// lifetime of the process; only one call to this should ever run.
    pub async fn run_distributor(self: Arc<Self>, cancel: CancellationToken) {
        let mut rx = match self.inbound_rx.lock().await.take() {
            Some(rx) => rx,
            None => {
                warn!("event bus distributor already running");
                return;
            }
        };
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = rx.recv() => {
                    match event {
                        Some(event) => self.distribute(event).await,
                        None => break,
                    }
                }
            }
        }
        debug!("event bus distributor stopped");
    }

    async fn distribute(&self, event: Event) {
        if event.is_expired() {
            self.metrics.events_dropped_ttl_expired.increment();
            return;
        }
        let event = Arc::new(event);

        let mut candidates: DashSet<SubscriptionId> = DashSet::new();
        if let Some(ids) = self.type_index.get(&event.event_type) {
            for id in ids.iter() {
                candidates.insert(*id);
            }
        }
        if let Some(room_id) = event.room_id {
            if let Some(ids) = self.room_index.get(&room_id) {
                for id in ids.iter() {
                    candidates.insert(*id);
                }
            }
        }
        if let Some(username) = &event.username {
            if let Some(ids) = self.user_index.get(username) {
                for id in ids.iter() {
                    candidates.insert(*id);
                }
            }
        }

        let mut delivered = false;
        for id in candidates.iter() {
            let Some(subscription) = self.subscriptions.get(*id).map(|e| e.value().clone()) else {
                continue;
            };
            if !subscription.is_active() || !subscription.matches(&event) {
                continue;
            }
            if subscription.has_channel() {
                if subscription.try_deliver(event.clone()) {
                    delivered = true;
                    self.metrics.events_delivered.increment();
                } else {
                    self.metrics.events_dropped_subscriber_full.increment();
                }
            }
            if let Some(handler) = subscription.handler() {
                let handler = handler.clone();
                let event = event.clone();
                tokio::spawn(async move {
                    if let Err(err) = handler.handle_event(&event).await {
                        warn!(error = %err, "event handler returned an error");
                    }
                });
                delivered = true;
            }
        }
        if !delivered {
            trace!(event_type = ?event.event_type, "event matched no subscription");
        }

        let mut history = self.history.lock().await;
        history.push_back(event);
        while history.len() > self.config.history_capacity {
            history.pop_front();
        }
    }

    /// Background housekeeping: every `cleanup_interval`, drop
    /// expired-TTL history entries and purge subscriptions that were
    /// deactivated more than `subscription_ttl` ago.
    pub async fn run_cleanup(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.cleanup_interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.cleanup_once().await,
            }
        }
        debug!("event bus cleanup stopped");
    }

    async fn cleanup_once(&self) {
        {
            let mut history = self.history.lock().await;
            history.retain(|event| !event.is_expired());
        }

        let ttl = chrono::Duration::from_std(self.config.subscription_ttl)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let now = chrono::Utc::now();
        let stale: Vec<SubscriptionId> = self
            .subscriptions
            .iter()
            .filter(|entry| !entry.value().is_active() && now - entry.value().created_at > ttl)
            .map(|entry| *entry.key())
            .collect();

        for id in stale {
            self.subscriptions.remove(&id);
            for mut ids in self.type_index.iter_mut() {
                ids.remove(&id);
            }
            for mut ids in self.room_index.iter_mut() {
                ids.remove(&id);
            }
            for mut ids in self.user_index.iter_mut() {
                ids.remove(&id);
            }
        }
    }

    pub async fn history_snapshot(&self) -> Vec<Arc<Event>> {
        self.history.lock().await.iter().cloned().collect()
    }
}

//! Process-wide counters for the core components, exported as a JSON
//! snapshot (`GET /health`) and Prometheus text exposition (`GET /metrics`).
//!
//! Every counter here corresponds to a behavior called out in the error
//! handling taxonomy: queue-full drops, slow-consumer evictions, and the
//! lossy event bus are all "documented, counted, never silent" per spec.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// A single monotonic counter or up/down gauge, lock-free to update.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement(&self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counters shared by reference across every component; constructed once
/// at composition-root time.
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Connection Pool (C1)
    pub connections_active: Counter,
    pub connections_total: Counter,
    pub slow_consumer_evictions: Counter,
    pub connections_reaped_idle: Counter,

    // Event Bus (C2)
    pub events_published: Counter,
    pub events_dropped_inbound_full: Counter,
    pub events_dropped_ttl_expired: Counter,
    pub events_delivered: Counter,
    pub events_dropped_subscriber_full: Counter,
    pub subscriptions_active: Counter,

    // Room Manager (C3)
    pub rooms_created: Counter,
    pub rooms_active: Counter,
    pub rooms_closed: Counter,
    pub host_migrations: Counter,

    // Matchmaking Service (C4)
    pub matchmaking_requests_active: Counter,
    pub matches_made: Counter,
    pub matchmaking_timeouts: Counter,
    pub matchmaking_cancellations: Counter,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cheap JSON snapshot for `GET /health`.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_active: self.connections_active.get(),
            connections_total: self.connections_total.get(),
            slow_consumer_evictions: self.slow_consumer_evictions.get(),
            events_published: self.events_published.get(),
            events_dropped: self.events_dropped_inbound_full.get()
                + self.events_dropped_ttl_expired.get()
                + self.events_dropped_subscriber_full.get(),
            rooms_active: self.rooms_active.get(),
            matches_made: self.matches_made.get(),
            matchmaking_requests_active: self.matchmaking_requests_active.get(),
        }
    }

    /// Render every counter as Prometheus text exposition format for
    /// `GET /metrics`.
    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();
        let mut line = |name: &str, help: &str, value: u64| {
            out.push_str(&format!(
                "# HELP {name} {help}\n# TYPE {name} counter\n{name} {value}\n"
            ));
        };
        line(
            "session_fabric_connections_active",
            "Currently registered connections",
            self.connections_active.get(),
        );
        line(
            "session_fabric_connections_total",
            "Connections registered since startup",
            self.connections_total.get(),
        );
        line(
            "session_fabric_slow_consumer_evictions_total",
            "Connections evicted for a full outbound queue",
            self.slow_consumer_evictions.get(),
        );
        line(
            "session_fabric_connections_reaped_idle_total",
            "Connections reaped for exceeding the idle timeout",
            self.connections_reaped_idle.get(),
        );
        line(
            "session_fabric_events_published_total",
            "Events accepted onto the bus inbound channel",
            self.events_published.get(),
        );
        line(
            "session_fabric_events_dropped_inbound_full_total",
            "Events dropped because the inbound channel was full",
            self.events_dropped_inbound_full.get(),
        );
        line(
            "session_fabric_events_dropped_ttl_expired_total",
            "Events dropped because their TTL expired before distribution",
            self.events_dropped_ttl_expired.get(),
        );
        line(
            "session_fabric_events_delivered_total",
            "Events delivered to at least one subscriber channel",
            self.events_delivered.get(),
        );
        line(
            "session_fabric_events_dropped_subscriber_full_total",
            "Per-subscriber deliveries dropped for a full subscriber channel",
            self.events_dropped_subscriber_full.get(),
        );
        line(
            "session_fabric_subscriptions_active",
            "Currently active bus subscriptions",
            self.subscriptions_active.get(),
        );
        line(
            "session_fabric_rooms_created_total",
            "Rooms created since startup",
            self.rooms_created.get(),
        );
        line(
            "session_fabric_rooms_active",
            "Currently open rooms",
            self.rooms_active.get(),
        );
        line(
            "session_fabric_rooms_closed_total",
            "Rooms closed since startup",
            self.rooms_closed.get(),
        );
        line(
            "session_fabric_host_migrations_total",
            "Host migrations performed after a host disconnected",
            self.host_migrations.get(),
        );
        line(
            "session_fabric_matchmaking_requests_active",
            "Currently pending matchmaking requests",
            self.matchmaking_requests_active.get(),
        );
        line(
            "session_fabric_matches_made_total",
            "Rooms formed by the matchmaking service",
            self.matches_made.get(),
        );
        line(
            "session_fabric_matchmaking_timeouts_total",
            "Matchmaking requests cancelled for exceeding maxWaitTime",
            self.matchmaking_timeouts.get(),
        );
        line(
            "session_fabric_matchmaking_cancellations_total",
            "Matchmaking requests cancelled by the user",
            self.matchmaking_cancellations.get(),
        );
        out
    }
}

/// JSON-friendly snapshot used by `GET /health`.
#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub connections_active: u64,
    pub connections_total: u64,
    pub slow_consumer_evictions: u64,
    pub events_published: u64,
    pub events_dropped: u64,
    pub rooms_active: u64,
    pub matches_made: u64,
    pub matchmaking_requests_active: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_round_trips() {
        let c = Counter::default();
        c.increment();
        c.increment();
        c.decrement();
        assert_eq!(c.get(), 1);
    }

    #[test]
    fn prometheus_render_contains_expected_metric_names() {
        let metrics = ServerMetrics::new();
        metrics.connections_active.increment();
        let rendered = metrics.render_prometheus();
        assert!(rendered.contains("session_fabric_connections_active 1"));
    }
}

//! Root configuration types and the per-component config structs each
//! component reads at construction time.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::defaults::*;
use super::logging::LoggingConfig;

/// Root configuration struct.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub room: RoomConfig,
    #[serde(default)]
    pub matchmaking: MatchmakingConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            enable_cors: default_enable_cors(),
            allowed_origins: default_allowed_origins(),
            connection: ConnectionConfig::default(),
            room: RoomConfig::default(),
            matchmaking: MatchmakingConfig::default(),
            bus: BusConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Recompute the `Duration` fields derived from the `_secs` wire
    /// fields. Required after deserializing from JSON, since
    /// `#[serde(skip)]` fields are left at `Duration::default()` by serde.
    pub fn finalize(&mut self) {
        self.connection.resolve_durations();
        self.room.resolve_durations();
        self.matchmaking.resolve_durations();
        self.bus.resolve_durations();
    }
}

/// Connection Pool (C1) tuning.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConnectionConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,
    #[serde(default = "default_connection_idle_timeout_secs", rename = "connection_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_read_deadline_secs")]
    pub read_deadline_secs: u64,
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,

    #[serde(skip)]
    pub idle_timeout: Duration,
    #[serde(skip)]
    pub heartbeat_interval: Duration,
    #[serde(skip)]
    pub read_deadline: Duration,
    #[serde(skip)]
    pub reap_interval: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        let mut cfg = Self {
            max_connections: default_max_connections(),
            max_message_size: default_max_message_size(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
            idle_timeout_secs: default_connection_idle_timeout_secs(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            read_deadline_secs: default_read_deadline_secs(),
            reap_interval_secs: default_reap_interval_secs(),
            idle_timeout: Duration::ZERO,
            heartbeat_interval: Duration::ZERO,
            read_deadline: Duration::ZERO,
            reap_interval: Duration::ZERO,
        };
        cfg.resolve_durations();
        cfg
    }
}

impl ConnectionConfig {
    /// Materialize the `Duration` fields from the `_secs` wire fields.
    /// Called after deserialization since `serde(skip)` fields are left at
    /// their `Default` during `from_value`.
    pub fn resolve_durations(&mut self) {
        self.idle_timeout = Duration::from_secs(self.idle_timeout_secs);
        self.heartbeat_interval = Duration::from_secs(self.heartbeat_interval_secs);
        self.read_deadline = Duration::from_secs(self.read_deadline_secs);
        self.reap_interval = Duration::from_secs(self.reap_interval_secs);
    }
}

/// Room Manager (C3) tuning.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RoomConfig {
    #[serde(default = "default_max_rooms")]
    pub max_rooms: usize,
    #[serde(default = "default_max_players_per_room")]
    pub max_players_per_room: u8,
    #[serde(default = "default_min_players_per_room")]
    pub min_players_per_room: u8,
    #[serde(default = "default_room_inactivity_timeout_secs", rename = "roomInactivityTimeout")]
    pub inactivity_timeout_secs: u64,
    #[serde(default = "default_room_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_room_event_channel_capacity")]
    pub event_channel_capacity: usize,
    /// Game types the built-in [`crate::engine::MiniGameEngine`] accepts at
    /// `CreateRoom`. A real deployment swaps in a collaborator with its
    /// own catalog; this default keeps the crate runnable standalone.
    #[serde(default = "default_supported_game_types")]
    pub supported_game_types: Vec<String>,

    #[serde(skip)]
    pub inactivity_timeout: Duration,
    #[serde(skip)]
    pub sweep_interval: Duration,
}

impl Default for RoomConfig {
    fn default() -> Self {
        let mut cfg = Self {
            max_rooms: default_max_rooms(),
            max_players_per_room: default_max_players_per_room(),
            min_players_per_room: default_min_players_per_room(),
            inactivity_timeout_secs: default_room_inactivity_timeout_secs(),
            sweep_interval_secs: default_room_sweep_interval_secs(),
            event_channel_capacity: default_room_event_channel_capacity(),
            supported_game_types: default_supported_game_types(),
            inactivity_timeout: Duration::ZERO,
            sweep_interval: Duration::ZERO,
        };
        cfg.resolve_durations();
        cfg
    }
}

impl RoomConfig {
    pub fn resolve_durations(&mut self) {
        self.inactivity_timeout = Duration::from_secs(self.inactivity_timeout_secs);
        self.sweep_interval = Duration::from_secs(self.sweep_interval_secs);
    }
}

/// Matchmaking Service (C4) tuning.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MatchmakingConfig {
    #[serde(default = "default_matchmaking_max_wait_secs", rename = "matchmakingMaxWait")]
    pub default_max_wait_secs: u64,
    #[serde(default = "default_match_tick_interval_secs", rename = "matchTickInterval")]
    pub tick_interval_secs: u64,
    #[serde(default = "default_skill_base_window", rename = "skillBaseWindow")]
    pub skill_base_window: f64,
    #[serde(default = "default_skill_max_window", rename = "skillMaxWindow")]
    pub skill_max_window: f64,
    #[serde(default = "default_skill_expansion_rate", rename = "skillExpansionRate")]
    pub skill_expansion_rate: f64,
    #[serde(default = "default_match_cooldown_secs", rename = "matchCooldown")]
    pub cooldown_secs: u64,
    #[serde(default = "default_max_players_per_match")]
    pub max_players_per_match: u8,
    #[serde(default = "default_min_players_per_match")]
    pub min_players_per_match: u8,
    #[serde(default = "default_match_history_retention_secs")]
    pub history_retention_secs: u64,

    #[serde(skip)]
    pub tick_interval: Duration,
    #[serde(skip)]
    pub cooldown: Duration,
    #[serde(skip)]
    pub history_retention: Duration,
}

impl Default for MatchmakingConfig {
    fn default() -> Self {
        let mut cfg = Self {
            default_max_wait_secs: default_matchmaking_max_wait_secs(),
            tick_interval_secs: default_match_tick_interval_secs(),
            skill_base_window: default_skill_base_window(),
            skill_max_window: default_skill_max_window(),
            skill_expansion_rate: default_skill_expansion_rate(),
            cooldown_secs: default_match_cooldown_secs(),
            max_players_per_match: default_max_players_per_match(),
            min_players_per_match: default_min_players_per_match(),
            history_retention_secs: default_match_history_retention_secs(),
            tick_interval: Duration::ZERO,
            cooldown: Duration::ZERO,
            history_retention: Duration::ZERO,
        };
        cfg.resolve_durations();
        cfg
    }
}

impl MatchmakingConfig {
    pub fn resolve_durations(&mut self) {
        self.tick_interval = Duration::from_secs(self.tick_interval_secs);
        self.cooldown = Duration::from_secs(self.cooldown_secs);
        self.history_retention = Duration::from_secs(self.history_retention_secs);
    }

    /// Dynamic skill window at `wait_seconds` of anchor wait time:
    /// `min(max, base * expansion_rate ^ (wait_seconds / 30))`.
    pub fn skill_window(&self, wait_seconds: f64) -> f64 {
        let expanded = self.skill_base_window * self.skill_expansion_rate.powf(wait_seconds / 30.0);
        expanded.min(self.skill_max_window)
    }
}

/// Event Bus (C2) tuning.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BusConfig {
    #[serde(default = "default_bus_inbound_capacity")]
    pub inbound_capacity: usize,
    #[serde(default = "default_bus_subscriber_capacity")]
    pub subscriber_capacity: usize,
    #[serde(default = "default_bus_history_capacity")]
    pub history_capacity: usize,
    #[serde(default = "default_bus_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
    #[serde(default = "default_bus_subscription_ttl_secs")]
    pub subscription_ttl_secs: u64,

    #[serde(skip)]
    pub cleanup_interval: Duration,
    #[serde(skip)]
    pub subscription_ttl: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        let mut cfg = Self {
            inbound_capacity: default_bus_inbound_capacity(),
            subscriber_capacity: default_bus_subscriber_capacity(),
            history_capacity: default_bus_history_capacity(),
            cleanup_interval_secs: default_bus_cleanup_interval_secs(),
            subscription_ttl_secs: default_bus_subscription_ttl_secs(),
            cleanup_interval: Duration::ZERO,
            subscription_ttl: Duration::ZERO,
        };
        cfg.resolve_durations();
        cfg
    }
}

impl BusConfig {
    pub fn resolve_durations(&mut self) {
        self.cleanup_interval = Duration::from_secs(self.cleanup_interval_secs);
        self.subscription_ttl = Duration::from_secs(self.subscription_ttl_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skill_window_grows_and_caps_at_max() {
        let cfg = MatchmakingConfig::default();
        assert!((cfg.skill_window(0.0) - 20.0).abs() < f64::EPSILON);
        assert!(cfg.skill_window(30.0) > 20.0);
        assert!(cfg.skill_window(3600.0) <= 50.0);
    }
}

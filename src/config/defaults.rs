//! Default value functions for configuration fields.
//!
//! Organized by the component each default belongs to. Every field with a
//! `#[serde(default = ...)]` attribute points here so partial JSON/env
//! overlays only need to specify the fields they want to change.

// =============================================================================
// Root
// =============================================================================

pub const fn default_port() -> u16 {
    8082
}

pub const fn default_enable_cors() -> bool {
    true
}

pub fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

// =============================================================================
// Connection Pool
// =============================================================================

pub const fn default_max_connections() -> usize {
    1000
}

pub const fn default_max_message_size() -> usize {
    64 * 1024
}

pub const fn default_connection_idle_timeout_secs() -> u64 {
    300 // 5 minutes
}

pub const fn default_heartbeat_interval_secs() -> u64 {
    54
}

pub const fn default_read_deadline_secs() -> u64 {
    60
}

pub const fn default_reap_interval_secs() -> u64 {
    30
}

pub const fn default_outbound_queue_capacity() -> usize {
    256
}

// =============================================================================
// Room Manager
// =============================================================================

pub const fn default_max_rooms() -> usize {
    100
}

pub const fn default_max_players_per_room() -> u8 {
    8
}

pub const fn default_min_players_per_room() -> u8 {
    2
}

pub const fn default_room_inactivity_timeout_secs() -> u64 {
    1800 // 30 minutes
}

pub const fn default_room_sweep_interval_secs() -> u64 {
    300 // 5 minutes
}

pub const fn default_room_event_channel_capacity() -> usize {
    256
}

pub fn default_supported_game_types() -> Vec<String> {
    vec![
        "click_speed".to_string(),
        "trivia".to_string(),
        "memory_match".to_string(),
    ]
}

// =============================================================================
// Matchmaking
// =============================================================================

pub const fn default_matchmaking_max_wait_secs() -> u64 {
    300 // 5 minutes
}

pub const fn default_match_tick_interval_secs() -> u64 {
    2
}

pub const fn default_skill_base_window() -> f64 {
    20.0
}

pub const fn default_skill_max_window() -> f64 {
    50.0
}

pub const fn default_skill_expansion_rate() -> f64 {
    1.2
}

pub const fn default_match_cooldown_secs() -> u64 {
    10
}

pub const fn default_max_players_per_match() -> u8 {
    8
}

pub const fn default_min_players_per_match() -> u8 {
    2
}

pub const fn default_match_history_retention_secs() -> u64 {
    86_400 // 24 hours
}

// =============================================================================
// Event Bus
// =============================================================================

pub const fn default_bus_inbound_capacity() -> usize {
    1024
}

pub const fn default_bus_subscriber_capacity() -> usize {
    256
}

pub const fn default_bus_history_capacity() -> usize {
    1000
}

pub const fn default_bus_cleanup_interval_secs() -> u64 {
    600 // 10 minutes
}

pub const fn default_bus_subscription_ttl_secs() -> u64 {
    3600 // 1 hour
}

// =============================================================================
// Logging
// =============================================================================

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "server.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    false
}

pub const fn default_log_format() -> super::logging::LogFormat {
    super::logging::LogFormat::Json
}

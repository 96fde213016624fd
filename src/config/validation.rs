//! Configuration validation.
//!
//! Mirrors the defaults/loader split: `load()` always returns a `Config`
//! (falling back to defaults on parse failure), and validation is a
//! separate pass callers can run explicitly (`main.rs --validate-config`
//! does, and `load()` itself logs violations to stderr without failing).

use super::Config;

/// Every boundary violation found in a [`Config`], collected rather than
/// short-circuited on the first failure so `--validate-config` reports
/// everything wrong in one pass.
#[derive(Debug, thiserror::Error)]
#[error("configuration invalid:\n{}", .0.join("\n"))]
pub struct ConfigValidationError(pub Vec<String>);

/// Validate the boundary behaviors from the spec: room player bounds,
/// matchmaking skill-window ordering, and queue capacities are all
/// positive. Returns every violation found, not just the first.
pub fn validate_config(config: &Config) -> Result<(), ConfigValidationError> {
    let mut errors = Vec::new();

    let room = &config.room;
    if room.min_players_per_room < 2 || room.min_players_per_room > 8 {
        errors.push(format!(
            "room.min_players_per_room must be within [2, 8], got {}",
            room.min_players_per_room
        ));
    }
    if room.max_players_per_room < 2 || room.max_players_per_room > 8 {
        errors.push(format!(
            "room.max_players_per_room must be within [2, 8], got {}",
            room.max_players_per_room
        ));
    }
    if room.min_players_per_room > room.max_players_per_room {
        errors.push(format!(
            "room.min_players_per_room ({}) must be <= room.max_players_per_room ({})",
            room.min_players_per_room, room.max_players_per_room
        ));
    }
    if room.max_rooms == 0 {
        errors.push("room.max_rooms must be > 0".to_string());
    }

    let mm = &config.matchmaking;
    if mm.min_players_per_match < 2 || mm.min_players_per_match > 8 {
        errors.push(format!(
            "matchmaking.min_players_per_match must be within [2, 8], got {}",
            mm.min_players_per_match
        ));
    }
    if mm.max_players_per_match < 2 || mm.max_players_per_match > 8 {
        errors.push(format!(
            "matchmaking.max_players_per_match must be within [2, 8], got {}",
            mm.max_players_per_match
        ));
    }
    if mm.min_players_per_match > mm.max_players_per_match {
        errors.push(format!(
            "matchmaking.min_players_per_match ({}) must be <= matchmaking.max_players_per_match ({})",
            mm.min_players_per_match, mm.max_players_per_match
        ));
    }
    if mm.skill_base_window <= 0.0 {
        errors.push("matchmaking.skill_base_window must be > 0".to_string());
    }
    if mm.skill_base_window > mm.skill_max_window {
        errors.push(format!(
            "matchmaking.skill_base_window ({}) must be <= matchmaking.skill_max_window ({})",
            mm.skill_base_window, mm.skill_max_window
        ));
    }
    if mm.skill_expansion_rate < 1.0 {
        errors.push(format!(
            "matchmaking.skill_expansion_rate ({}) must be >= 1.0, or the window would shrink over time",
            mm.skill_expansion_rate
        ));
    }
    if mm.tick_interval_secs == 0 {
        errors.push("matchmaking.tick_interval_secs must be > 0".to_string());
    }

    let bus = &config.bus;
    if bus.inbound_capacity == 0 {
        errors.push("bus.inbound_capacity must be > 0".to_string());
    }
    if bus.subscriber_capacity == 0 {
        errors.push("bus.subscriber_capacity must be > 0".to_string());
    }
    if bus.history_capacity == 0 {
        errors.push("bus.history_capacity must be > 0".to_string());
    }

    let conn = &config.connection;
    if conn.max_connections == 0 {
        errors.push("connection.max_connections must be > 0".to_string());
    }
    if conn.outbound_queue_capacity == 0 {
        errors.push("connection.outbound_queue_capacity must be > 0".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigValidationError(errors))
    }
}

/// Detect if we're running in production mode, via `SESSION_FABRIC_ENVIRONMENT`
/// or the generic `PRODUCTION` / `PROD` environment variables.
pub fn is_production_mode() -> bool {
    use std::env;

    if let Ok(mode) = env::var("SESSION_FABRIC_ENVIRONMENT") {
        return mode.eq_ignore_ascii_case("production") || mode.eq_ignore_ascii_case("prod");
    }
    env::var("SESSION_FABRIC_PRODUCTION").is_ok()
        || env::var("PRODUCTION").is_ok()
        || env::var("PROD").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn inverted_player_bounds_are_rejected() {
        let mut config = Config::default();
        config.room.min_players_per_room = 6;
        config.room.max_players_per_room = 2;
        let err = validate_config(&config).unwrap_err();
        assert!(err.0.iter().any(|msg| msg.contains("min_players_per_room")));
    }

    #[test]
    fn skill_window_above_max_is_rejected() {
        let mut config = Config::default();
        config.matchmaking.skill_base_window = 60.0;
        assert!(validate_config(&config).is_err());
    }
}

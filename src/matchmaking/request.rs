use chrono::{DateTime, Duration, Utc};

use crate::protocol::{MatchmakingPreferences, RequestId, Username};

/// A player's pending intent to be placed in a room.
#[derive(Debug, Clone)]
pub struct MatchmakingRequest {
    pub request_id: RequestId,
    pub username: Username,
    pub game_type: String,
    pub skill_level: u8,
    pub preferred_players: u8,
    pub max_wait: Duration,
    pub created_at: DateTime<Utc>,
    pub preferences: MatchmakingPreferences,
}

impl MatchmakingRequest {
    pub fn new(
        username: Username,
        game_type: String,
        skill_level: u8,
        preferred_players: u8,
        max_wait: Duration,
        preferences: MatchmakingPreferences,
    ) -> Self {
        Self {
            request_id: RequestId::new_v4(),
            username,
            game_type,
            skill_level: skill_level.clamp(1, 100),
            preferred_players: preferred_players.clamp(2, 8),
            max_wait,
            created_at: Utc::now(),
            preferences,
        }
    }

    pub fn wait_seconds(&self) -> f64 {
        (Utc::now() - self.created_at).num_milliseconds() as f64 / 1000.0
    }

    pub fn has_expired(&self) -> bool {
        Utc::now() - self.created_at > self.max_wait
    }
}

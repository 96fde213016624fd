//! External collaborator interfaces the core calls into but never
//! implements itself: per-mini-game rule logic and reward persistence are
//! explicitly out of scope (spec §1). The traits here are the seam; the
//! default implementations below exist only so the crate is runnable as a
//! standalone binary without a real game-rule service wired in.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::protocol::{RoomId, Username};

/// Bounds a game type accepts for room sizing. Returned by
/// `MiniGameEngine::list_game_types`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GameTypeConfig {
    pub min_players: u8,
    pub max_players: u8,
}

/// A player's final standing in a completed room, handed to the engine
/// for scoring once `EndGame` has fired.
#[derive(Debug, Clone)]
pub struct GameResult {
    pub room_id: RoomId,
    pub game_type: String,
    pub username: Username,
    pub score: i64,
}

/// The engine's verdict on a [`GameResult`]: whether it's a legitimate
/// result at all, and the reward it earns if so.
#[derive(Debug, Clone, Copy)]
pub struct RewardResult {
    pub is_valid: bool,
    pub points: i64,
    pub exp: i64,
}

/// Per-mini-game rule logic, consumed but never owned by the core.
/// `ListGameTypes` gates `CreateRoom`; `CalculateReward` feeds the Event
/// Processor's (C5) `game_end` reaction.
#[async_trait]
pub trait MiniGameEngine: Send + Sync {
    fn list_game_types(&self) -> HashMap<String, GameTypeConfig>;

    async fn calculate_reward(&self, result: &GameResult) -> RewardResult;
}

/// Persistence of awarded points — explicitly out of scope (spec §1); the
/// core only calls the interface, never stores anything itself.
#[async_trait]
pub trait PointAwarder: Send + Sync {
    async fn award_points(&self, result: &GameResult, reward: &RewardResult);
}

/// A fixed catalog of game types with a uniform reward formula
/// (1 point per point of positive score, no bonus exp). Good enough to
/// exercise the core end to end; a real deployment replaces this with a
/// collaborator backed by actual game rules.
pub struct StaticGameEngine {
    game_types: HashMap<String, GameTypeConfig>,
}

impl StaticGameEngine {
    pub fn new(supported_game_types: &[String], min_players: u8, max_players: u8) -> Self {
        let game_types = supported_game_types
            .iter()
            .map(|name| {
                (
                    name.clone(),
                    GameTypeConfig {
                        min_players,
                        max_players,
                    },
                )
            })
            .collect();
        Self { game_types }
    }
}

#[async_trait]
impl MiniGameEngine for StaticGameEngine {
    fn list_game_types(&self) -> HashMap<String, GameTypeConfig> {
        self.game_types.clone()
    }

    async fn calculate_reward(&self, result: &GameResult) -> RewardResult {
        if result.score <= 0 {
            return RewardResult {
                is_valid: false,
                points: 0,
                exp: 0,
            };
        }
        RewardResult {
            is_valid: true,
            points: result.score,
            exp: result.score / 10,
        }
    }
}

/// Logs the award rather than persisting it — persistence is the
/// caller's concern per spec §1.
pub struct LoggingPointAwarder;

#[async_trait]
impl PointAwarder for LoggingPointAwarder {
    async fn award_points(&self, result: &GameResult, reward: &RewardResult) {
        tracing::info!(
            username = %result.username,
            room_id = %result.room_id,
            points = reward.points,
            exp = reward.exp,
            "awarded points"
        );
    }
}

pub type SharedMiniGameEngine = Arc<dyn MiniGameEngine>;
pub type SharedPointAwarder = Arc<dyn PointAwarder>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn non_positive_score_is_not_a_valid_reward() {
        let engine = StaticGameEngine::new(&["click_speed".to_string()], 2, 8);
        let result = GameResult {
            room_id: RoomId::new_v4(),
            game_type: "click_speed".to_string(),
            username: "alice".to_string(),
            score: 0,
        };
        let reward = engine.calculate_reward(&result).await;
        assert!(!reward.is_valid);
    }

    #[tokio::test]
    async fn positive_score_yields_points_proportional_to_score() {
        let engine = StaticGameEngine::new(&["click_speed".to_string()], 2, 8);
        let result = GameResult {
            room_id: RoomId::new_v4(),
            game_type: "click_speed".to_string(),
            username: "alice".to_string(),
            score: 120,
        };
        let reward = engine.calculate_reward(&result).await;
        assert!(reward.is_valid);
        assert_eq!(reward.points, 120);
        assert_eq!(reward.exp, 12);
    }
}

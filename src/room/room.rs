use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::protocol::{Player, RoomId, RoomSettings, RoomState, Username};

use super::error::RoomError;

/// What happened as a result of a member leaving, needed by the caller to
/// decide which events to emit.
pub struct LeaveOutcome {
    pub new_host: Option<Username>,
    pub room_closed: bool,
}

/// Authoritative state for one room. Holds no lock itself — the
/// [`super::manager::RoomManager`] wraps each instance in its own
/// `tokio::sync::Mutex`, so every method here takes `&mut self` and is
/// called with that lock held for the duration of one operation.
pub struct Room {
    pub room_id: RoomId,
    pub name: String,
    pub game_type: String,
    pub state: RoomState,
    pub min_players: u8,
    pub max_players: u8,
    pub host_username: Username,
    pub is_private: bool,
    pub password: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Keyed by username in a `BTreeMap` so host migration's "smallest
    /// lexicographic username" tie-break is a single `keys().next()`.
    pub members: BTreeMap<Username, Player>,
}

impl Room {
    pub fn new(
        room_id: RoomId,
        game_type: String,
        host: Username,
        settings: RoomSettings,
    ) -> Result<Self, RoomError> {
        if settings.min_players < 2
            || settings.max_players > 8
            || settings.min_players > settings.max_players
        {
            return Err(RoomError::InvalidRoomSettings);
        }
        let now = Utc::now();
        let mut members = BTreeMap::new();
        members.insert(host.clone(), Player::new(host.clone(), true));
        Ok(Self {
            room_id,
            name: settings.name,
            game_type,
            state: RoomState::Waiting,
            min_players: settings.min_players,
            max_players: settings.max_players,
            host_username: host,
            is_private: settings.is_private,
            password: settings.password,
            created_at: now,
            last_activity: now,
            start_time: None,
            end_time: None,
            members,
        })
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_inactive(&self, timeout: chrono::Duration) -> bool {
        self.is_empty() || Utc::now() - self.last_activity > timeout
    }

    /// `JoinRoom`: only `Waiting` rooms admit new members, below
    /// capacity, with a matching password if private.
    pub fn join(&mut self, user: Username, password: Option<&str>) -> Result<(), RoomError> {
        if self.state != RoomState::Waiting {
            return Err(RoomError::RoomNotAccepting);
        }
        if self.members.len() >= self.max_players as usize {
            return Err(RoomError::RoomFull);
        }
        if self.is_private {
            let expected = self.password.as_deref().unwrap_or("");
            if password.unwrap_or("") != expected {
                return Err(RoomError::BadPassword);
            }
        }
        self.members.insert(user.clone(), Player::new(user, false));
        self.touch();
        Ok(())
    }

    /// `LeaveRoom`: remove the member; migrate the host if they were the
    /// one leaving (smallest lexicographic username among the rest);
    /// report whether the room is now empty so the caller closes it.
    pub fn leave(&mut self, user: &str) -> Result<LeaveOutcome, RoomError> {
        if self.members.remove(user).is_none() {
            return Err(RoomError::NotInRoom);
        }
        self.touch();

        if self.members.is_empty() {
            return Ok(LeaveOutcome {
                new_host: None,
                room_closed: true,
            });
        }

        let mut new_host = None;
        if self.host_username == user {
            let next_host = self
                .members
                .keys()
                .next()
                .cloned()
                .expect("members checked non-empty above");
            self.host_username = next_host.clone();
            if let Some(player) = self.members.get_mut(&next_host) {
                player.is_host = true;
            }
            new_host = Some(next_host);
        }

        Ok(LeaveOutcome {
            new_host,
            room_closed: false,
        })
    }

    /// `SetReady`: toggle readiness; promote `Waiting` to `Ready` once
    /// every member is ready and the room has met `min_players`. Returns
    /// whether the room transitioned to `Ready` as a result.
    pub fn set_ready(&mut self, user: &str, ready: bool) -> Result<bool, RoomError> {
        let player = self.members.get_mut(user).ok_or(RoomError::NotInRoom)?;
        player.is_ready = ready;
        self.touch();

        let became_ready = self.state == RoomState::Waiting
            && self.members.len() >= self.min_players as usize
            && self.members.values().all(|p| p.is_ready);
        if became_ready {
            self.state = RoomState::Ready;
        } else if self.state == RoomState::Ready && !self.members.values().all(|p| p.is_ready) {
            self.state = RoomState::Waiting;
        }
        Ok(became_ready)
    }

    /// `StartGame`: only the host, only from `Ready`. Stamps `startTime`
    /// and resets per-player score/gameData for the new round.
    pub fn start_game(&mut self, user: &str) -> Result<(), RoomError> {
        if self.host_username != user {
            return Err(RoomError::NotHost);
        }
        if self.state != RoomState::Ready {
            return Err(RoomError::NotReady);
        }
        self.state = RoomState::InProgress;
        self.start_time = Some(Utc::now());
        self.end_time = None;
        for player in self.members.values_mut() {
            player.score = 0;
            player.game_data = serde_json::Value::Null;
            player.last_action_at = None;
        }
        self.touch();
        Ok(())
    }

    /// `ProcessAction`: only while `InProgress`; bumps the acting
    /// player's `lastActionAt`. The action payload itself is opaque and
    /// carried by the caller into the emitted event.
    pub fn process_action(&mut self, user: &str) -> Result<(), RoomError> {
        if self.state != RoomState::InProgress {
            return Err(RoomError::RoomNotAccepting);
        }
        let player = self.members.get_mut(user).ok_or(RoomError::NotInRoom)?;
        player.last_action_at = Some(Utc::now());
        self.touch();
        Ok(())
    }

    /// `EndGame`: stamps `endTime`, marks `Completed`.
    pub fn end_game(&mut self) -> Result<(), RoomError> {
        if self.state != RoomState::InProgress {
            return Err(RoomError::NotReady);
        }
        self.state = RoomState::Completed;
        self.end_time = Some(Utc::now());
        self.touch();
        Ok(())
    }

    pub fn close(&mut self) {
        self.state = RoomState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(min: u8, max: u8) -> RoomSettings {
        RoomSettings {
            name: "test room".to_string(),
            min_players: min,
            max_players: max,
            is_private: false,
            password: None,
        }
    }

    #[test]
    fn new_room_has_host_as_sole_ready_false_member() {
        let room = Room::new(RoomId::new_v4(), "click_speed".into(), "alice".into(), settings(2, 4)).unwrap();
        assert_eq!(room.members.len(), 1);
        assert!(room.members["alice"].is_host);
        assert!(!room.members["alice"].is_ready);
        assert_eq!(room.state, RoomState::Waiting);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let err = Room::new(RoomId::new_v4(), "click_speed".into(), "alice".into(), settings(5, 3)).unwrap_err();
        assert_eq!(err, RoomError::InvalidRoomSettings);
    }

    #[test]
    fn host_migrates_to_lexicographically_smallest_remaining_member() {
        let mut room = Room::new(RoomId::new_v4(), "click_speed".into(), "zack".into(), settings(2, 4)).unwrap();
        room.join("bob".into(), None).unwrap();
        room.join("alice".into(), None).unwrap();

        let outcome = room.leave("zack").unwrap();
        assert_eq!(outcome.new_host.as_deref(), Some("alice"));
        assert!(!outcome.room_closed);
        assert_eq!(room.host_username, "alice");
        assert!(room.members["alice"].is_host);
    }

    #[test]
    fn last_member_leaving_closes_the_room() {
        let mut room = Room::new(RoomId::new_v4(), "click_speed".into(), "alice".into(), settings(2, 4)).unwrap();
        let outcome = room.leave("alice").unwrap();
        assert!(outcome.room_closed);
        assert!(room.is_empty());
    }

    #[test]
    fn all_ready_with_enough_players_transitions_to_ready() {
        let mut room = Room::new(RoomId::new_v4(), "click_speed".into(), "alice".into(), settings(2, 4)).unwrap();
        room.join("bob".into(), None).unwrap();
        assert!(!room.set_ready("alice", true).unwrap());
        assert!(room.set_ready("bob", true).unwrap());
        assert_eq!(room.state, RoomState::Ready);
    }

    #[test]
    fn start_game_requires_host_and_ready_state() {
        let mut room = Room::new(RoomId::new_v4(), "click_speed".into(), "alice".into(), settings(2, 2)).unwrap();
        room.join("bob".into(), None).unwrap();
        assert_eq!(room.start_game("alice").unwrap_err(), RoomError::NotReady);

        room.set_ready("alice", true).unwrap();
        room.set_ready("bob", true).unwrap();
        assert_eq!(room.start_game("bob").unwrap_err(), RoomError::NotHost);

        room.start_game("alice").unwrap();
        assert_eq!(room.state, RoomState::InProgress);
        assert!(room.start_time.is_some());
        assert!(room.end_time.is_none());
    }

    #[test]
    fn join_rejects_when_full_or_not_waiting() {
        let mut room = Room::new(RoomId::new_v4(), "click_speed".into(), "alice".into(), settings(2, 2)).unwrap();
        room.join("bob".into(), None).unwrap();
        assert_eq!(room.join("carol".into(), None).unwrap_err(), RoomError::RoomFull);
    }

    #[test]
    fn private_room_rejects_bad_password() {
        let mut settings = settings(2, 4);
        settings.is_private = true;
        settings.password = Some("secret".to_string());
        let mut room = Room::new(RoomId::new_v4(), "click_speed".into(), "alice".into(), settings).unwrap();
        assert_eq!(
            room.join("bob".into(), Some("wrong")).unwrap_err(),
            RoomError::BadPassword
        );
        room.join("bob".into(), Some("secret")).unwrap();
        assert_eq!(room.members.len(), 2);
    }
}

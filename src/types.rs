use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sanitize::TurnPayload;

/// Opaque ID types
pub type GameId = String;
pub type UserId = String;
pub type PlayerId = i64;
pub type ThreadId = i64;
pub type TurnId = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum GameState {
    Open,
    Playing,
    Complete,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnType {
    Draw,
    Describe,
    Skip,
}

/// Identity handed to the core by the login provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSession {
    pub id: UserId,
    pub name: String,
    pub picture: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Game {
    pub id: GameId,
    pub state: GameState,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub game_id: GameId,
    pub user_id: UserId,
    pub name: String,
    pub avatar: Option<String>,
    pub is_admin: bool,
    pub left_game: bool,
    /// Position in the rotation, assigned when the game starts
    pub order: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Thread {
    pub id: ThreadId,
    pub game_id: GameId,
    pub turn_offset: usize,
    pub turn: usize,
    pub complete: bool,
    pub turn_updated_at: Option<DateTime<Utc>>,
}

impl Thread {
    /// Order of the player this thread is waiting on, or None once complete
    pub fn awaiting(&self, player_count: usize) -> Option<usize> {
        if self.complete || player_count == 0 {
            return None;
        }
        Some((self.turn + self.turn_offset) % player_count)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub id: TurnId,
    pub thread_id: ThreadId,
    pub player_id: PlayerId,
    pub turn_type: TurnType,
    pub data: Option<TurnPayload>,
    pub created_at: DateTime<Utc>,
}

/// A game together with its players (ordered by `order`) and threads
/// (ordered by `turn_offset`)
#[derive(Debug, Clone, PartialEq)]
pub struct GameRecord {
    pub game: Game,
    pub players: Vec<Player>,
    pub threads: Vec<Thread>,
}

impl GameRecord {
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn admin(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.is_admin)
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admin().is_some_and(|p| p.user_id == user_id)
    }

    pub fn player_by_user(&self, user_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.user_id == user_id)
    }

    pub fn player_by_order(&self, order: usize) -> Option<&Player> {
        self.players.iter().find(|p| p.order == Some(order))
    }

    pub fn thread(&self, thread_id: ThreadId) -> Option<&Thread> {
        self.threads.iter().find(|t| t.id == thread_id)
    }

    /// Threads currently waiting on the player at `order`
    pub fn threads_awaiting(&self, order: usize) -> impl Iterator<Item = &Thread> {
        let count = self.player_count();
        self.threads
            .iter()
            .filter(move |t| t.awaiting(count) == Some(order))
    }

    pub fn all_threads_complete(&self) -> bool {
        !self.threads.is_empty() && self.threads.iter().all(|t| t.complete)
    }

    /// Whether `user_id` is a current player some thread is waiting on
    pub fn is_waiting_on(&self, user_id: &str) -> bool {
        if self.game.state != GameState::Playing {
            return false;
        }
        match self.player_by_user(user_id) {
            Some(player) if !player.left_game => player
                .order
                .is_some_and(|order| self.threads_awaiting(order).next().is_some()),
            _ => false,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_thread_awaiting_wraps_around() {
        let t = thread(1, 3, 2);
        assert_eq!(t.awaiting(4), Some(1));

        let mut done = thread(2, 0, 4);
        done.complete = true;
        assert_eq!(done.awaiting(4), None);
    }

    #[test]
    fn test_threads_awaiting_player() {
        let mut record = playing(4);
        // Thread at offset 0 moves on to order 1, which now has two threads
        record.threads[0].turn = 1;

        let ids: Vec<_> = record.threads_awaiting(1).map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(record.threads_awaiting(0).count(), 0);
    }

    #[test]
    fn test_is_waiting_on_ignores_left_players() {
        let mut record = playing(4);
        assert!(record.is_waiting_on("user2"));

        record.players[2].left_game = true;
        assert!(!record.is_waiting_on("user2"));
        assert!(!record.is_waiting_on("nobody"));
    }

    #[test]
    fn test_admin_lookup() {
        let record = playing(3);
        assert!(record.is_admin("user0"));
        assert!(!record.is_admin("user1"));
        assert!(!record.all_threads_complete());
    }
}

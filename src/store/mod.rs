//! Game repository: persistence seam for the Game/Player/Thread/Turn graph.
//!
//! The state machine reads a [`GameRecord`], decides, and hands back one
//! [`GameChanges`] value. Stores apply a change set atomically: either every
//! row in it is written or none are.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::sanitize::TurnPayload;
use crate::types::*;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Missing row: {0}")]
    MissingRow(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPlayer {
    pub user_id: UserId,
    pub name: String,
    pub avatar: Option<String>,
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewThread {
    pub turn_offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTurn {
    pub thread_id: ThreadId,
    pub player_id: PlayerId,
    pub turn_type: TurnType,
    pub data: Option<TurnPayload>,
}

/// Everything one state machine operation writes for a single game
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameChanges {
    pub state: Option<GameState>,
    pub completed_at: Option<DateTime<Utc>>,
    pub add_players: Vec<NewPlayer>,
    pub remove_players: Vec<PlayerId>,
    /// Full replacement rows, matched by id
    pub update_players: Vec<Player>,
    pub add_threads: Vec<NewThread>,
    /// Full replacement rows, matched by id
    pub update_threads: Vec<Thread>,
    /// Appended in order
    pub add_turns: Vec<NewTurn>,
}

impl GameChanges {
    pub fn is_empty(&self) -> bool {
        self.state.is_none()
            && self.completed_at.is_none()
            && self.add_players.is_empty()
            && self.remove_players.is_empty()
            && self.update_players.is_empty()
            && self.add_threads.is_empty()
            && self.update_threads.is_empty()
            && self.add_turns.is_empty()
    }
}

#[async_trait]
pub trait GameStore: Send + Sync {
    /// Create an Open game with its admin player. Returns `false` without
    /// writing anything when `id` is already taken.
    async fn insert_game(
        &self,
        id: &str,
        admin: NewPlayer,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Game with players ordered by `order` and threads by `turn_offset`
    async fn fetch_game(&self, id: &str) -> StoreResult<Option<GameRecord>>;

    /// Turns of the given threads in creation order
    async fn fetch_turns(&self, thread_ids: &[ThreadId]) -> StoreResult<Vec<Turn>>;

    /// Game record and the turns of all its threads, read together so
    /// both reflect the same commit
    async fn fetch_game_with_turns(
        &self,
        id: &str,
    ) -> StoreResult<Option<(GameRecord, Vec<Turn>)>>;

    /// Non-complete games where `user_id` is the admin
    async fn count_unfinished_admin_games(&self, user_id: &str) -> StoreResult<usize>;

    /// Every game `user_id` is a player of, newest first
    async fn games_for_user(&self, user_id: &str) -> StoreResult<Vec<GameRecord>>;

    /// Delete a game and all rows it owns. Returns `false` if it was absent.
    async fn delete_game(&self, id: &str) -> StoreResult<bool>;

    /// Apply a change set atomically
    async fn commit(&self, game_id: &str, changes: GameChanges) -> StoreResult<()>;
}

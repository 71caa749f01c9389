mod game;
mod player;
mod turn;

pub use turn::next_turn_type;

use std::sync::Arc;

use crate::config::GameRules;
use crate::error::{GameError, GameResult};
use crate::locks::LockMap;
use crate::names::{self, NameSource, PetNames};
use crate::notifier::ChangeNotifier;
use crate::random::{RandomSource, ThreadRandom};
use crate::store::GameStore;
use crate::types::*;

/// The game state machine. Every mutating operation loads the game, checks
/// its preconditions, commits one change set and then announces the change.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn GameStore>,
    pub notifier: ChangeNotifier,
    pub rules: GameRules,
    random: Arc<dyn RandomSource>,
    names: Arc<dyn NameSource>,
    /// Serializes read-modify-write sequences per game
    game_locks: Arc<LockMap<GameId>>,
    /// Serializes game creation per user (quota check + insert)
    creator_locks: Arc<LockMap<UserId>>,
}

impl AppState {
    pub fn new(store: Arc<dyn GameStore>, notifier: ChangeNotifier, rules: GameRules) -> Self {
        Self {
            store,
            notifier,
            rules,
            random: Arc::new(ThreadRandom),
            names: Arc::new(PetNames),
            game_locks: Arc::new(LockMap::new()),
            creator_locks: Arc::new(LockMap::new()),
        }
    }

    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    pub fn with_names(mut self, names: Arc<dyn NameSource>) -> Self {
        self.names = names;
        self
    }

    /// Load a game or fail with NotFound
    async fn load(&self, game_id: &str) -> GameResult<GameRecord> {
        if !names::looks_like_game_id(game_id) {
            return Err(GameError::not_found("Game not found"));
        }
        self.store
            .fetch_game(game_id)
            .await?
            .ok_or_else(|| GameError::not_found("Game not found"))
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

use super::{GameChanges, GameStore, NewPlayer, StoreError, StoreResult};
use crate::types::*;

#[derive(Debug, Default)]
struct Tables {
    games: HashMap<GameId, Game>,
    players: BTreeMap<PlayerId, Player>,
    threads: BTreeMap<ThreadId, Thread>,
    turns: BTreeMap<TurnId, Turn>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn record(&self, game: &Game) -> GameRecord {
        let mut players: Vec<Player> = self
            .players
            .values()
            .filter(|p| p.game_id == game.id)
            .cloned()
            .collect();
        players.sort_by_key(|p| (p.order, p.id));

        let mut threads: Vec<Thread> = self
            .threads
            .values()
            .filter(|t| t.game_id == game.id)
            .cloned()
            .collect();
        threads.sort_by_key(|t| (t.turn_offset, t.id));

        GameRecord {
            game: game.clone(),
            players,
            threads,
        }
    }
}

/// In-process store, suitable for a single server instance and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn insert_game(
        &self,
        id: &str,
        admin: NewPlayer,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.games.contains_key(id) {
            return Ok(false);
        }

        tables.games.insert(
            id.to_string(),
            Game {
                id: id.to_string(),
                state: GameState::Open,
                created_at: now,
                completed_at: None,
            },
        );

        let player_id = tables.next_id();
        tables.players.insert(
            player_id,
            Player {
                id: player_id,
                game_id: id.to_string(),
                user_id: admin.user_id,
                name: admin.name,
                avatar: admin.avatar,
                is_admin: admin.is_admin,
                left_game: false,
                order: None,
            },
        );
        Ok(true)
    }

    async fn fetch_game(&self, id: &str) -> StoreResult<Option<GameRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.games.get(id).map(|game| tables.record(game)))
    }

    async fn fetch_turns(&self, thread_ids: &[ThreadId]) -> StoreResult<Vec<Turn>> {
        let wanted: HashSet<ThreadId> = thread_ids.iter().copied().collect();
        let tables = self.tables.read().await;
        // BTreeMap keyed by increasing id == creation order
        Ok(tables
            .turns
            .values()
            .filter(|t| wanted.contains(&t.thread_id))
            .cloned()
            .collect())
    }

    async fn fetch_game_with_turns(
        &self,
        id: &str,
    ) -> StoreResult<Option<(GameRecord, Vec<Turn>)>> {
        let tables = self.tables.read().await;
        let Some(game) = tables.games.get(id) else {
            return Ok(None);
        };
        let record = tables.record(game);
        let thread_ids: HashSet<ThreadId> = record.threads.iter().map(|t| t.id).collect();
        let turns = tables
            .turns
            .values()
            .filter(|t| thread_ids.contains(&t.thread_id))
            .cloned()
            .collect();
        Ok(Some((record, turns)))
    }

    async fn count_unfinished_admin_games(&self, user_id: &str) -> StoreResult<usize> {
        let tables = self.tables.read().await;
        Ok(tables
            .players
            .values()
            .filter(|p| p.is_admin && p.user_id == user_id)
            .filter(|p| {
                tables
                    .games
                    .get(&p.game_id)
                    .is_some_and(|g| g.state != GameState::Complete)
            })
            .count())
    }

    async fn games_for_user(&self, user_id: &str) -> StoreResult<Vec<GameRecord>> {
        let tables = self.tables.read().await;
        let mut games: Vec<&Game> = tables
            .players
            .values()
            .filter(|p| p.user_id == user_id)
            .filter_map(|p| tables.games.get(&p.game_id))
            .collect();
        games.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(games.into_iter().map(|g| tables.record(g)).collect())
    }

    async fn delete_game(&self, id: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.games.remove(id).is_none() {
            return Ok(false);
        }

        let thread_ids: HashSet<ThreadId> = tables
            .threads
            .values()
            .filter(|t| t.game_id == id)
            .map(|t| t.id)
            .collect();

        tables.turns.retain(|_, t| !thread_ids.contains(&t.thread_id));
        tables.threads.retain(|_, t| t.game_id != id);
        tables.players.retain(|_, p| p.game_id != id);
        Ok(true)
    }

    async fn commit(&self, game_id: &str, changes: GameChanges) -> StoreResult<()> {
        let mut tables = self.tables.write().await;

        let mut game = tables
            .games
            .get(game_id)
            .cloned()
            .ok_or_else(|| StoreError::MissingRow(format!("game {}", game_id)))?;
        let current = tables.record(&game);

        // Stage every write against a copy of this game's rows, validate, then swap in
        if let Some(state) = changes.state {
            if state < game.state {
                return Err(StoreError::Conflict(format!(
                    "game {} cannot move from {:?} back to {:?}",
                    game_id, game.state, state
                )));
            }
            game.state = state;
        }
        if changes.completed_at.is_some() {
            game.completed_at = changes.completed_at;
        }

        let mut players: BTreeMap<PlayerId, Player> =
            current.players.into_iter().map(|p| (p.id, p)).collect();
        let mut threads: BTreeMap<ThreadId, Thread> =
            current.threads.into_iter().map(|t| (t.id, t)).collect();

        for id in &changes.remove_players {
            if players.remove(id).is_none() {
                return Err(StoreError::MissingRow(format!("player {}", id)));
            }
        }
        for player in changes.update_players {
            match players.get_mut(&player.id) {
                Some(existing) if player.game_id == game_id => *existing = player,
                _ => return Err(StoreError::MissingRow(format!("player {}", player.id))),
            }
        }

        let mut next_id = tables.next_id;
        let mut alloc = || {
            next_id += 1;
            next_id
        };

        for new in changes.add_players {
            let id = alloc();
            players.insert(
                id,
                Player {
                    id,
                    game_id: game_id.to_string(),
                    user_id: new.user_id,
                    name: new.name,
                    avatar: new.avatar,
                    is_admin: new.is_admin,
                    left_game: false,
                    order: None,
                },
            );
        }

        for thread in changes.update_threads {
            match threads.get_mut(&thread.id) {
                Some(existing) if thread.game_id == game_id => *existing = thread,
                _ => return Err(StoreError::MissingRow(format!("thread {}", thread.id))),
            }
        }
        for new in changes.add_threads {
            let id = alloc();
            threads.insert(
                id,
                Thread {
                    id,
                    game_id: game_id.to_string(),
                    turn_offset: new.turn_offset,
                    turn: 0,
                    complete: false,
                    turn_updated_at: None,
                },
            );
        }

        let mut users = HashSet::new();
        let mut orders = HashSet::new();
        for player in players.values() {
            if !users.insert(player.user_id.as_str()) {
                return Err(StoreError::Conflict(format!(
                    "user {} is already in game {}",
                    player.user_id, game_id
                )));
            }
            if let Some(order) = player.order {
                if !orders.insert(order) {
                    return Err(StoreError::Conflict(format!(
                        "order {} is taken in game {}",
                        order, game_id
                    )));
                }
            }
        }
        let mut offsets = HashSet::new();
        for thread in threads.values() {
            if !offsets.insert(thread.turn_offset) {
                return Err(StoreError::Conflict(format!(
                    "turn offset {} is taken in game {}",
                    thread.turn_offset, game_id
                )));
            }
        }

        let now = Utc::now();
        let mut turns = Vec::with_capacity(changes.add_turns.len());
        for new in changes.add_turns {
            if !threads.contains_key(&new.thread_id) {
                return Err(StoreError::MissingRow(format!("thread {}", new.thread_id)));
            }
            if !players.contains_key(&new.player_id) {
                return Err(StoreError::MissingRow(format!("player {}", new.player_id)));
            }
            let id = alloc();
            turns.push(Turn {
                id,
                thread_id: new.thread_id,
                player_id: new.player_id,
                turn_type: new.turn_type,
                data: new.data,
                created_at: now,
            });
        }

        // Validation passed: apply
        tables.next_id = next_id;
        tables.games.insert(game_id.to_string(), game);
        tables.players.retain(|_, p| p.game_id != game_id);
        tables.players.extend(players);
        tables.threads.retain(|_, t| t.game_id != game_id);
        tables.threads.extend(threads);
        tables.turns.extend(turns.into_iter().map(|t| (t.id, t)));
        Ok(())
    }
}

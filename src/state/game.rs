use chrono::Utc;

use super::AppState;
use crate::error::{GameError, GameResult};
use crate::names;
use crate::projection;
use crate::protocol::{GamePageData, UserGame};
use crate::random;
use crate::sanitize;
use crate::store::{GameChanges, NewPlayer, NewThread};
use crate::types::*;

impl AppState {
    /// Create a game administered by `user`. Returns the new game id.
    pub async fn create_game(
        &self,
        user: &UserSession,
        display_name: Option<&str>,
        hide_avatar: bool,
    ) -> GameResult<GameId> {
        let name = sanitize::display_name(display_name.unwrap_or(&user.name), &self.rules)?;

        let _guard = self.creator_locks.lock(&user.id).await;

        let open = self.store.count_unfinished_admin_games(&user.id).await?;
        if open >= self.rules.max_open_games {
            return Err(GameError::QuotaExceeded(open));
        }

        let admin = NewPlayer {
            user_id: user.id.clone(),
            name,
            avatar: if hide_avatar { None } else { user.picture.clone() },
            is_admin: true,
        };

        let game_id = loop {
            let candidate = self.names.candidate();
            if self
                .store
                .insert_game(&candidate, admin.clone(), Utc::now())
                .await?
            {
                break candidate;
            }
            // Collision - try again (very unlikely with five words)
            tracing::debug!("Game id {} already taken, retrying", candidate);
        };

        tracing::info!("Game {} created by {}", game_id, user.id);
        self.notifier.notify(&game_id);
        Ok(game_id)
    }

    /// Delete a game and everything in it. Admin only, not once complete.
    pub async fn cancel_game(&self, game_id: &str, acting_user: &str) -> GameResult<()> {
        let _guard = self.game_locks.lock(&game_id.to_string()).await;
        let record = self.load(game_id).await?;

        if !record.is_admin(acting_user) {
            return Err(GameError::forbidden("Only the admin can cancel a game"));
        }
        if record.game.state == GameState::Complete {
            return Err(GameError::forbidden("Game already complete"));
        }

        self.store.delete_game(game_id).await?;

        tracing::info!("Game {} cancelled", game_id);
        self.notifier.notify(game_id);
        Ok(())
    }

    /// Shuffle the players into an order and create one thread per player
    pub async fn start_game(&self, game_id: &str, acting_user: &str) -> GameResult<()> {
        let _guard = self.game_locks.lock(&game_id.to_string()).await;
        let record = self.load(game_id).await?;

        if !record.is_admin(acting_user) {
            return Err(GameError::forbidden("Only the admin can start a game"));
        }
        if record.game.state != GameState::Open {
            return Err(GameError::forbidden("Game already started"));
        }
        if record.player_count() < self.rules.min_players {
            return Err(GameError::forbidden(format!(
                "Need at least {} players to start, have {}",
                self.rules.min_players,
                record.player_count()
            )));
        }

        let shuffled = random::shuffle(record.players, self.random.as_ref());
        let mut changes = GameChanges {
            state: Some(GameState::Playing),
            ..Default::default()
        };
        for (order, mut player) in shuffled.into_iter().enumerate() {
            player.order = Some(order);
            changes.update_players.push(player);
            changes.add_threads.push(NewThread { turn_offset: order });
        }

        let player_count = changes.update_players.len();
        self.store.commit(game_id, changes).await?;

        tracing::info!("Game {} started with {} players", game_id, player_count);
        self.notifier.notify(game_id);
        Ok(())
    }

    /// Games `user` takes part in, newest first
    pub async fn user_games(&self, user: &UserSession) -> GameResult<Vec<UserGame>> {
        let records = self.store.games_for_user(&user.id).await?;
        Ok(records
            .iter()
            .map(|record| UserGame {
                id: record.game.id.clone(),
                state: record.game.state,
                is_admin: record.is_admin(&user.id),
                waiting_on_player: record.is_waiting_on(&user.id),
                player_count: record.player_count(),
                created_at: record.game.created_at,
                completed_at: record.game.completed_at,
            })
            .collect())
    }

    /// The projected state of a game for `viewer`
    pub async fn page_data(&self, game_id: &str, viewer: Option<&str>) -> GameResult<GamePageData> {
        if !names::looks_like_game_id(game_id) {
            return Err(GameError::not_found("Game not found"));
        }
        let (record, turns) = self
            .store
            .fetch_game_with_turns(game_id)
            .await?
            .ok_or_else(|| GameError::not_found("Game not found"))?;
        Ok(projection::project(&record, &turns, viewer))
    }
}

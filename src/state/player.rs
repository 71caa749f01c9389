use chrono::Utc;

use super::turn::{advance_thread, complete_if_finished};
use super::AppState;
use crate::error::{GameError, GameResult};
use crate::sanitize;
use crate::store::{GameChanges, NewPlayer};
use crate::types::*;

impl AppState {
    /// Join an Open game. Joining twice is a no-op.
    pub async fn join_game(
        &self,
        game_id: &str,
        user: &UserSession,
        display_name: Option<&str>,
        hide_avatar: bool,
    ) -> GameResult<()> {
        let name = sanitize::display_name(display_name.unwrap_or(&user.name), &self.rules)?;

        let _guard = self.game_locks.lock(&game_id.to_string()).await;
        let record = self.load(game_id).await?;

        if record.game.state != GameState::Open {
            return Err(GameError::forbidden("Game already started"));
        }
        // Quick exit if player already exists
        if record.player_by_user(&user.id).is_some() {
            return Ok(());
        }

        let changes = GameChanges {
            add_players: vec![NewPlayer {
                user_id: user.id.clone(),
                name,
                avatar: if hide_avatar { None } else { user.picture.clone() },
                is_admin: false,
            }],
            ..Default::default()
        };
        self.store.commit(game_id, changes).await?;

        tracing::info!("{} joined game {}", user.id, game_id);
        self.notifier.notify(game_id);
        Ok(())
    }

    /// Remove `target_user` from a game. Players may remove themselves, the
    /// admin may remove anyone but themselves.
    ///
    /// Before the game starts the player is deleted. Mid-game the player is
    /// flagged as left and every thread waiting on them is skipped forward.
    pub async fn leave_game(
        &self,
        game_id: &str,
        target_user: &str,
        acting_user: &str,
    ) -> GameResult<()> {
        let _guard = self.game_locks.lock(&game_id.to_string()).await;
        let mut record = self.load(game_id).await?;

        let Some(target) = record.player_by_user(target_user).cloned() else {
            return Ok(());
        };
        if target.is_admin {
            return Err(GameError::forbidden("Admin cannot leave a game"));
        }
        if record.game.state == GameState::Complete {
            return Err(GameError::forbidden("Cannot leave a completed game"));
        }
        if acting_user != target_user && !record.is_admin(acting_user) {
            return Err(GameError::forbidden(
                "Only the admin can remove other players",
            ));
        }
        if target.left_game {
            return Ok(());
        }

        let mut changes = GameChanges::default();

        if record.game.state == GameState::Open {
            changes.remove_players.push(target.id);
        } else {
            let now = Utc::now();
            let player_count = record.player_count();

            if let Some(player) = record.players.iter_mut().find(|p| p.id == target.id) {
                player.left_game = true;
                changes.update_players.push(player.clone());
            }

            for thread in record.threads.iter_mut() {
                if target.order.is_none() || thread.awaiting(player_count) != target.order {
                    continue;
                }
                let skipped = advance_thread(thread, &record.players, TurnType::Skip, None, now)?;
                tracing::debug!(
                    "Skipped {} turn(s) on thread {} after {} left",
                    skipped.len(),
                    thread.id,
                    target_user
                );
                changes.add_turns.extend(skipped);
                changes.update_threads.push(thread.clone());
            }

            // Once, after every cascade has settled
            if complete_if_finished(&record.threads, &mut changes, now) {
                tracing::info!("Game {} complete", game_id);
            }
        }

        self.store.commit(game_id, changes).await?;

        tracing::info!(
            "{} left game {} (removed by {})",
            target_user,
            game_id,
            acting_user
        );
        self.notifier.notify(game_id);
        Ok(())
    }
}

use chrono::{DateTime, Utc};

use super::AppState;
use crate::error::{GameError, GameResult};
use crate::sanitize::{self, TurnPayload};
use crate::store::{GameChanges, NewTurn};
use crate::types::*;

/// Type of the next turn on a thread: the first turn describes, after that
/// turns alternate based on the last turn that wasn't a skip.
pub fn next_turn_type(turns: &[Turn]) -> TurnType {
    match turns.iter().rev().find(|t| t.turn_type != TurnType::Skip) {
        Some(last) if last.turn_type == TurnType::Describe => TurnType::Draw,
        _ => TurnType::Describe,
    }
}

/// Record a turn on `thread` for whoever it awaits, advance the thread, then
/// keep inserting skips while the newly awaited player has left.
///
/// Returns the turns to append, in order.
pub(crate) fn advance_thread(
    thread: &mut Thread,
    players: &[Player],
    turn_type: TurnType,
    data: Option<TurnPayload>,
    now: DateTime<Utc>,
) -> GameResult<Vec<NewTurn>> {
    let player_count = players.len();
    let mut recorded = Vec::new();
    let mut next = Some((turn_type, data));

    while let Some((turn_type, data)) = next.take() {
        let order = thread
            .awaiting(player_count)
            .ok_or_else(|| GameError::forbidden("Thread already complete"))?;
        let player = players
            .iter()
            .find(|p| p.order == Some(order))
            .ok_or_else(|| GameError::not_found(format!("No player at position {}", order)))?;

        recorded.push(NewTurn {
            thread_id: thread.id,
            player_id: player.id,
            turn_type,
            data,
        });

        if thread.turn + 1 == player_count {
            thread.complete = true;
            break;
        }
        thread.turn += 1;
        thread.turn_updated_at = Some(now);

        let awaited_left = thread
            .awaiting(player_count)
            .and_then(|order| players.iter().find(|p| p.order == Some(order)))
            .is_some_and(|p| p.left_game);
        if awaited_left {
            next = Some((TurnType::Skip, None));
        }
    }

    Ok(recorded)
}

/// Mark the game complete in `changes` if every thread is done
pub(crate) fn complete_if_finished(
    threads: &[Thread],
    changes: &mut GameChanges,
    now: DateTime<Utc>,
) -> bool {
    let done = !threads.is_empty() && threads.iter().all(|t| t.complete);
    if done {
        changes.state = Some(GameState::Complete);
        changes.completed_at = Some(now);
    }
    done
}

impl AppState {
    /// Play the acting user's turn on a thread that is waiting on them
    pub async fn play_turn(
        &self,
        game_id: &str,
        thread_id: ThreadId,
        acting_user: &str,
        raw_data: &str,
    ) -> GameResult<()> {
        let _guard = self.game_locks.lock(&game_id.to_string()).await;
        let mut record = self.load(game_id).await?;

        if record.game.state != GameState::Playing {
            return Err(GameError::forbidden("Game is not in progress"));
        }
        let player = record
            .player_by_user(acting_user)
            .ok_or_else(|| GameError::not_found("Player not found"))?;
        if player.left_game {
            return Err(GameError::forbidden("You have left this game"));
        }
        let order = player.order;
        let player_count = record.player_count();

        let thread_idx = record
            .threads
            .iter()
            .position(|t| t.id == thread_id)
            .ok_or_else(|| GameError::not_found("Thread not found"))?;

        let thread = &record.threads[thread_idx];
        if thread.complete {
            return Err(GameError::forbidden("Thread already complete"));
        }
        if order.is_none() || thread.awaiting(player_count) != order {
            return Err(GameError::forbidden("Not your turn on this thread"));
        }

        let history = self.store.fetch_turns(&[thread_id]).await?;
        let turn_type = next_turn_type(&history);
        let payload = sanitize::turn_payload(turn_type, raw_data, &self.rules)?;

        let now = Utc::now();
        let thread = &mut record.threads[thread_idx];
        let turns = advance_thread(thread, &record.players, turn_type, Some(payload), now)?;

        let mut changes = GameChanges {
            update_threads: vec![thread.clone()],
            add_turns: turns,
            ..Default::default()
        };
        let finished = complete_if_finished(&record.threads, &mut changes, now);

        self.store.commit(game_id, changes).await?;

        tracing::info!(
            "{:?} turn played by {} on thread {} of game {}",
            turn_type,
            acting_user,
            thread_id,
            game_id
        );
        if finished {
            tracing::info!("Game {} complete", game_id);
        }
        self.notifier.notify(game_id);
        Ok(())
    }
}

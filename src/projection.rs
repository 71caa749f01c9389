//! Per-viewer view of a game.
//!
//! Turn content of unfinished threads is private: a current player sees only
//! the latest turn of the single thread they should answer next, spectators
//! see none. Once the game is complete every turn is public.

use crate::protocol::{GamePageData, GameView, PlayerView, ThreadView, TurnView};
use crate::types::*;

/// Project `record` for `viewer`. `turns` holds the turns of the game's
/// threads in creation order; turns of other games are ignored.
pub fn project(record: &GameRecord, turns: &[Turn], viewer: Option<&str>) -> GamePageData {
    let reveal_all = record.game.state == GameState::Complete;

    let threads = record
        .threads
        .iter()
        .map(|thread| {
            let mut view = ThreadView::from(thread);
            if reveal_all {
                view.turns = Some(
                    turns
                        .iter()
                        .filter(|t| t.thread_id == thread.id)
                        .map(TurnView::from)
                        .collect(),
                );
            }
            view
        })
        .collect();

    let in_play = viewer.and_then(|user_id| in_play_thread(record, user_id));
    let last_turn = in_play.and_then(|thread| last_non_skip(turns, thread.id));

    GamePageData {
        game: GameView {
            id: record.game.id.clone(),
            state: record.game.state,
            players: record.players.iter().map(PlayerView::from).collect(),
            threads,
        },
        in_play_thread: in_play.map(ThreadView::from),
        last_turn_in_thread: last_turn.map(TurnView::from),
    }
}

/// The thread `user_id` should act on next: of the threads awaiting them,
/// the one that has waited longest. Never-advanced threads count as oldest;
/// ties go to the lower offset.
pub fn in_play_thread<'a>(record: &'a GameRecord, user_id: &str) -> Option<&'a Thread> {
    if record.game.state != GameState::Playing {
        return None;
    }
    let player = record.player_by_user(user_id)?;
    if player.left_game {
        return None;
    }
    let order = player.order?;

    record
        .threads_awaiting(order)
        .min_by_key(|t| (t.turn_updated_at, t.turn_offset))
}

/// Most recent turn with content on a thread
pub fn last_non_skip(turns: &[Turn], thread_id: ThreadId) -> Option<&Turn> {
    turns
        .iter()
        .rev()
        .find(|t| t.thread_id == thread_id && t.turn_type != TurnType::Skip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::{TextPayload, TurnPayload};
    use crate::types::fixtures::playing;
    use chrono::{Duration, Utc};

    fn text_turn(id: TurnId, thread_id: ThreadId, player_id: PlayerId, text: &str) -> Turn {
        Turn {
            id,
            thread_id,
            player_id,
            turn_type: TurnType::Describe,
            data: Some(TurnPayload::Text(TextPayload {
                text: text.to_string(),
            })),
            created_at: Utc::now(),
        }
    }

    fn skip_turn(id: TurnId, thread_id: ThreadId, player_id: PlayerId) -> Turn {
        Turn {
            id,
            thread_id,
            player_id,
            turn_type: TurnType::Skip,
            data: None,
            created_at: Utc::now(),
        }
    }

    fn text_of(view: &TurnView) -> &str {
        match &view.data {
            Some(TurnPayload::Text(t)) => &t.text,
            other => panic!("Expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_awaited_player_sees_previous_turn() {
        let mut record = playing(4);
        // user0 (order 0) described on thread 1; thread 1 now awaits order 1
        record.threads[0].turn = 1;
        record.threads[0].turn_updated_at = Some(Utc::now());
        let turns = vec![text_turn(10, 1, 1, "cat")];

        let view = project(&record, &turns, Some("user1"));
        // user1 is awaited on thread 1 (advanced) and thread 2 (fresh); fresh is older
        assert_eq!(view.in_play_thread.as_ref().map(|t| t.id), Some(2));
        assert!(view.last_turn_in_thread.is_none());

        // Once user1 plays thread 2 the advanced thread 1 is next
        record.threads[1].turn = 1;
        record.threads[1].turn_updated_at = Some(Utc::now() + Duration::seconds(1));
        let view = project(&record, &turns, Some("user1"));
        assert_eq!(view.in_play_thread.as_ref().map(|t| t.id), Some(1));
        assert_eq!(text_of(view.last_turn_in_thread.as_ref().unwrap()), "cat");
    }

    #[test]
    fn test_stalest_thread_wins() {
        let mut record = playing(4);
        let now = Utc::now();
        // Both thread 1 and thread 2 await order 2
        record.threads[0].turn = 2;
        record.threads[0].turn_updated_at = Some(now);
        record.threads[1].turn = 1;
        record.threads[1].turn_updated_at = Some(now - Duration::seconds(30));
        record.threads[2].turn = 1;
        record.threads[2].turn_updated_at = Some(now);
        let turns = vec![text_turn(10, 1, 1, "old"), text_turn(11, 2, 2, "stale")];

        let view = project(&record, &turns, Some("user2"));
        assert_eq!(view.in_play_thread.as_ref().map(|t| t.id), Some(2));
        assert_eq!(text_of(view.last_turn_in_thread.as_ref().unwrap()), "stale");
    }

    #[test]
    fn test_skip_turns_are_passed_over() {
        let mut record = playing(4);
        record.threads[0].turn = 2;
        record.threads[0].turn_updated_at = Some(Utc::now());
        record.threads[2].turn = 1;
        record.threads[2].turn_updated_at = Some(Utc::now());
        let turns = vec![text_turn(10, 1, 1, "dog"), skip_turn(11, 1, 2)];

        let view = project(&record, &turns, Some("user2"));
        assert_eq!(view.in_play_thread.as_ref().map(|t| t.id), Some(1));
        assert_eq!(text_of(view.last_turn_in_thread.as_ref().unwrap()), "dog");
    }

    #[test]
    fn test_spectators_and_left_players_see_nothing() {
        let mut record = playing(4);
        record.threads[0].turn = 1;
        let turns = vec![text_turn(10, 1, 1, "cat")];

        let anon = project(&record, &turns, None);
        assert!(anon.in_play_thread.is_none());
        assert!(anon.game.threads.iter().all(|t| t.turns.is_none()));

        let stranger = project(&record, &turns, Some("stranger"));
        assert!(stranger.last_turn_in_thread.is_none());

        record.players[1].left_game = true;
        let left = project(&record, &turns, Some("user1"));
        assert!(left.in_play_thread.is_none());
        assert!(left.last_turn_in_thread.is_none());
    }

    #[test]
    fn test_other_players_do_not_see_in_progress_content() {
        let mut record = playing(4);
        record.threads[0].turn = 1;
        let turns = vec![text_turn(10, 1, 1, "cat")];

        // user3 is awaited only on thread 4, which has no turns yet
        let view = project(&record, &turns, Some("user3"));
        assert_eq!(view.in_play_thread.as_ref().map(|t| t.id), Some(4));
        assert!(view.last_turn_in_thread.is_none());
        assert!(view.game.threads.iter().all(|t| t.turns.is_none()));
    }

    #[test]
    fn test_complete_game_reveals_everything() {
        let mut record = playing(2);
        record.game.state = GameState::Complete;
        for thread in &mut record.threads {
            thread.turn = 1;
            thread.complete = true;
        }
        let turns = vec![
            text_turn(10, 1, 1, "a"),
            text_turn(11, 2, 2, "b"),
            skip_turn(12, 1, 2),
        ];

        let view = project(&record, &turns, None);
        assert!(view.in_play_thread.is_none());
        let first = view.game.threads[0].turns.as_ref().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].turn_type, TurnType::Skip);
        assert_eq!(view.game.threads[1].turns.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_open_game_has_no_in_play_thread() {
        let mut record = playing(4);
        record.game.state = GameState::Open;
        let view = project(&record, &[], Some("user0"));
        assert!(view.in_play_thread.is_none());
        assert_eq!(view.game.players.len(), 4);
    }
}

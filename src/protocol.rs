use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sanitize::TurnPayload;
use crate::types::*;

/// Payload pushed to a connected client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ServerMessage {
    State(Box<GamePageData>),
    Cancelled { cancelled: bool },
}

impl ServerMessage {
    pub fn cancelled() -> Self {
        Self::Cancelled { cancelled: true }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Game state as one viewer is allowed to see it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GamePageData {
    pub game: GameView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_play_thread: Option<ThreadView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_turn_in_thread: Option<TurnView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
    pub id: GameId,
    pub state: GameState,
    pub players: Vec<PlayerView>,
    pub threads: Vec<ThreadView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub user_id: UserId,
    pub name: String,
    pub avatar: Option<String>,
    pub is_admin: bool,
    pub left_game: bool,
    pub order: Option<usize>,
}

impl From<&Player> for PlayerView {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id,
            user_id: p.user_id.clone(),
            name: p.name.clone(),
            avatar: p.avatar.clone(),
            is_admin: p.is_admin,
            left_game: p.left_game,
            order: p.order,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ThreadView {
    pub id: ThreadId,
    pub turn: usize,
    pub turn_offset: usize,
    pub complete: bool,
    pub turn_updated_at: Option<DateTime<Utc>>,
    /// Only present once the content is revealed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turns: Option<Vec<TurnView>>,
}

impl From<&Thread> for ThreadView {
    fn from(t: &Thread) -> Self {
        Self {
            id: t.id,
            turn: t.turn,
            turn_offset: t.turn_offset,
            complete: t.complete,
            turn_updated_at: t.turn_updated_at,
            turns: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TurnView {
    pub id: TurnId,
    pub player_id: PlayerId,
    #[serde(rename = "type")]
    pub turn_type: TurnType,
    pub data: Option<TurnPayload>,
}

impl From<&Turn> for TurnView {
    fn from(t: &Turn) -> Self {
        Self {
            id: t.id,
            player_id: t.player_id,
            turn_type: t.turn_type,
            data: t.data.clone(),
        }
    }
}

/// Entry in a user's game list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserGame {
    pub id: GameId,
    pub state: GameState,
    pub is_admin: bool,
    pub waiting_on_player: bool,
    pub player_count: usize,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

// ========== HTTP API bodies ==========

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    /// Display name; defaults to the login name
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub hide_avatar: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    /// Player to remove; defaults to the caller
    #[serde(default)]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TurnRequest {
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: GameId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

//! Real-time fan-out: keeps every connected viewer's projection current.
//!
//! Each subscriber owns a `watch` channel holding the latest payload for
//! its viewer. A refresh recomputes the payload per subscriber and
//! overwrites the channel value, so slow sockets only ever see the newest
//! state and never hold up anyone else.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use ulid::Ulid;

use crate::locks::LockMap;
use crate::notifier::ChangeListener;
use crate::projection;
use crate::protocol::ServerMessage;
use crate::store::{GameStore, StoreResult};
use crate::types::*;

pub type ConnectionId = Ulid;

struct Subscriber {
    viewer: Option<UserId>,
    tx: watch::Sender<ServerMessage>,
}

/// A live connection's view of one game
pub struct Subscription {
    pub id: ConnectionId,
    pub game_id: GameId,
    pub updates: watch::Receiver<ServerMessage>,
}

impl Subscription {
    /// Latest payload for this viewer
    pub fn current(&self) -> ServerMessage {
        self.updates.borrow().clone()
    }
}

pub struct FanOut {
    store: Arc<dyn GameStore>,
    games: RwLock<HashMap<GameId, HashMap<ConnectionId, Subscriber>>>,
    /// Orders refreshes (and initial snapshots) per game
    locks: LockMap<GameId>,
}

impl FanOut {
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self {
            store,
            games: RwLock::new(HashMap::new()),
            locks: LockMap::new(),
        }
    }

    /// Subscribe `viewer` to a game. The subscription's current value is the
    /// initial payload. A missing game yields the cancelled sentinel and the
    /// connection is not registered.
    pub async fn open(&self, game_id: &str, viewer: Option<&str>) -> StoreResult<Subscription> {
        let id = Ulid::new();
        let _guard = self.locks.lock(&game_id.to_string()).await;

        let initial = match self.snapshot(game_id).await? {
            Some((record, turns)) => ServerMessage::State(Box::new(projection::project(
                &record, &turns, viewer,
            ))),
            None => {
                let (_tx, updates) = watch::channel(ServerMessage::cancelled());
                return Ok(Subscription {
                    id,
                    game_id: game_id.to_string(),
                    updates,
                });
            }
        };

        let (tx, updates) = watch::channel(initial);
        self.games
            .write()
            .await
            .entry(game_id.to_string())
            .or_default()
            .insert(
                id,
                Subscriber {
                    viewer: viewer.map(str::to_string),
                    tx,
                },
            );

        tracing::debug!("Connection {} subscribed to game {}", id, game_id);
        Ok(Subscription {
            id,
            game_id: game_id.to_string(),
            updates,
        })
    }

    /// Forget a connection
    pub async fn close(&self, subscription: &Subscription) {
        let mut games = self.games.write().await;
        if let Some(subscribers) = games.get_mut(&subscription.game_id) {
            subscribers.remove(&subscription.id);
            if subscribers.is_empty() {
                games.remove(&subscription.game_id);
            }
        }
    }

    pub async fn subscriber_count(&self, game_id: &str) -> usize {
        self.games
            .read()
            .await
            .get(game_id)
            .map_or(0, |subscribers| subscribers.len())
    }

    /// Recompute and push the payload for every subscriber of a game
    pub async fn refresh(&self, game_id: &str) {
        let _guard = self.locks.lock(&game_id.to_string()).await;

        if self.subscriber_count(game_id).await == 0 {
            return;
        }

        let snapshot = match self.snapshot(game_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!("Failed to load game {} for subscribers: {}", game_id, e);
                return;
            }
        };

        let mut games = self.games.write().await;

        let Some((record, turns)) = snapshot else {
            // Gone: tell everyone and drop the whole entry
            if let Some(subscribers) = games.remove(game_id) {
                tracing::info!(
                    "Game {} gone, notifying {} subscriber(s)",
                    game_id,
                    subscribers.len()
                );
                for subscriber in subscribers.values() {
                    let _ = subscriber.tx.send(ServerMessage::cancelled());
                }
            }
            return;
        };

        let Some(subscribers) = games.get_mut(game_id) else {
            return;
        };
        subscribers.retain(|id, subscriber| {
            let payload = projection::project(&record, &turns, subscriber.viewer.as_deref());
            let delivered = subscriber
                .tx
                .send(ServerMessage::State(Box::new(payload)))
                .is_ok();
            if !delivered {
                tracing::debug!("Dropping closed connection {}", id);
            }
            delivered
        });
        tracing::debug!(
            "Pushed game {} to {} subscriber(s)",
            game_id,
            subscribers.len()
        );
        if subscribers.is_empty() {
            games.remove(game_id);
        }
    }

    /// Refresh every game that currently has subscribers
    pub async fn refresh_all(&self) {
        let game_ids: Vec<GameId> = self.games.read().await.keys().cloned().collect();
        for game_id in game_ids {
            self.refresh(&game_id).await;
        }
    }

    async fn snapshot(&self, game_id: &str) -> StoreResult<Option<(GameRecord, Vec<Turn>)>> {
        self.store.fetch_game_with_turns(game_id).await
    }
}

#[async_trait]
impl ChangeListener for FanOut {
    async fn game_changed(&self, game_id: GameId) {
        self.refresh(&game_id).await;
    }

    async fn missed_changes(&self, _count: u64) {
        self.refresh_all().await;
    }
}

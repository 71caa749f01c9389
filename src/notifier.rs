//! In-process "game changed" signal.
//!
//! Listeners only learn which game changed and must re-fetch. Delivery is
//! volatile: events fired while nobody listens are gone, and a lagging
//! listener is told it missed events rather than given a replay.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::types::GameId;

#[async_trait]
pub trait ChangeListener: Send + Sync + 'static {
    async fn game_changed(&self, game_id: GameId);

    /// Called when the listener fell behind and some events were dropped
    async fn missed_changes(&self, _count: u64) {}
}

#[derive(Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<GameId>,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Announce that a game changed. Never blocks.
    pub fn notify(&self, game_id: &str) {
        tracing::debug!("Game changed: {}", game_id);
        // No listeners is fine
        let _ = self.tx.send(game_id.to_string());
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameId> {
        self.tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Register a listener. It receives every event fired from now on until
    /// the returned handle is dropped or unsubscribed.
    pub fn listen<L: ChangeListener>(&self, listener: Arc<L>) -> ListenerHandle {
        let mut rx = self.tx.subscribe();

        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(game_id) => {
                        let listener = listener.clone();
                        supervise("Change listener failed", async move {
                            listener.game_changed(game_id).await
                        });
                    }
                    Err(broadcast::error::RecvError::Lagged(count)) => {
                        tracing::warn!("Change listener lagged, {} events dropped", count);
                        let listener = listener.clone();
                        supervise("Change listener failed after lag", async move {
                            listener.missed_changes(count).await
                        });
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        ListenerHandle { task }
    }
}

/// Run one handler call in its own task. The receive loop moves on at once,
/// so a slow or panicking handler only affects its own event.
fn supervise<F>(context: &'static str, handler: F)
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let handled = tokio::spawn(handler);
    tokio::spawn(async move {
        if let Err(e) = handled.await {
            tracing::error!("{}: {}", context, e);
        }
    });
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Keeps a listener registered; dropping it unsubscribes
pub struct ListenerHandle {
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub fn unsubscribe(self) {
        self.task.abort();
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

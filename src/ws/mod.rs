use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures::{
    sink::{Sink, SinkExt},
    stream::{Stream, StreamExt},
};
use std::fmt::Display;
use std::time::Duration;
use tokio::time::{interval_at, Instant};

use crate::api::ServerState;
use crate::auth::Identity;
use crate::fanout::Subscription;
use crate::protocol::ServerMessage;
use crate::types::GameId;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(game_id): Path<GameId>,
    identity: Identity,
    State(state): State<ServerState>,
) -> impl IntoResponse {
    tracing::info!(
        "WebSocket connection request: game={}, user={:?}",
        game_id,
        identity.user_id()
    );

    ws.on_upgrade(move |socket| handle_socket(socket, game_id, identity, state))
}

fn encode(msg: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::error!("Failed to encode message: {}", e);
            None
        }
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, game_id: GameId, identity: Identity, state: ServerState) {
    let (mut sender, mut receiver) = socket.split();

    let mut subscription = match state.fanout.open(&game_id, identity.user_id()).await {
        Ok(sub) => sub,
        Err(e) => {
            tracing::error!("Failed to subscribe to game {}: {}", game_id, e);
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };

    let reason =
        run_connection(&mut sender, &mut receiver, &mut subscription, state.keepalive).await;

    state.fanout.close(&subscription).await;
    tracing::info!(
        "WebSocket connection closed: {} ({:?})",
        subscription.id,
        reason
    );
}

/// Why a connection loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CloseReason {
    /// The game is gone; the sentinel and a Close frame were sent
    Cancelled,
    /// The fan-out dropped this subscriber
    Dropped,
    /// No frame arrived within one keepalive interval
    Silent,
    ClientClosed,
    SendFailed,
    ReceiveFailed,
}

/// Push the initial payload and every update to `sender` until the game
/// goes away, the peer hangs up, or the peer stops answering pings.
pub(crate) async fn run_connection<S, R, E>(
    sender: &mut S,
    receiver: &mut R,
    subscription: &mut Subscription,
    period: Duration,
) -> CloseReason
where
    S: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    // Initial state (or the cancelled sentinel, after which we hang up)
    let initial = subscription.updates.borrow_and_update().clone();
    if let Some(msg) = encode(&initial) {
        if sender.send(msg).await.is_err() {
            tracing::error!("Failed to send initial state");
            return CloseReason::SendFailed;
        }
    }
    if initial.is_cancelled() {
        let _ = sender.send(Message::Close(None)).await;
        return CloseReason::Cancelled;
    }

    tracing::info!("WebSocket connected: {}", subscription.id);

    let mut keepalive = interval_at(Instant::now() + period, period);
    let mut alive = true;

    loop {
        tokio::select! {
            changed = subscription.updates.changed() => {
                if changed.is_err() {
                    return CloseReason::Dropped;
                }
                let msg = subscription.updates.borrow_and_update().clone();
                if let Some(frame) = encode(&msg) {
                    if sender.send(frame).await.is_err() {
                        return CloseReason::SendFailed;
                    }
                }
                if msg.is_cancelled() {
                    let _ = sender.send(Message::Close(None)).await;
                    return CloseReason::Cancelled;
                }
            }

            _ = keepalive.tick() => {
                if !alive {
                    tracing::info!("Connection {} stopped answering, closing", subscription.id);
                    let _ = sender.send(Message::Close(None)).await;
                    return CloseReason::Silent;
                }
                alive = false;
                if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                    return CloseReason::SendFailed;
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Close(_))) => return CloseReason::ClientClosed,
                    Some(Ok(Message::Ping(data))) => {
                        alive = true;
                        if sender.send(Message::Pong(data)).await.is_err() {
                            return CloseReason::SendFailed;
                        }
                    }
                    // Clients have nothing to say; any frame proves liveness
                    Some(Ok(_)) => alive = true,
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        return CloseReason::ReceiveFailed;
                    }
                    None => return CloseReason::ClientClosed,
                }
            }
        }
    }
}

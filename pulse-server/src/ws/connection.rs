//! WebSocket connection handling

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::FeedState;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<FeedState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Forward the feed to one client until it leaves or a send fails
async fn handle_socket(socket: WebSocket, state: Arc<FeedState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut feed = state.subscribe();
    let mut closing = state.closing();
    let id = state.register_client().await;

    loop {
        tokio::select! {
            sample = feed.recv() => match sample {
                Ok(json) => {
                    if let Err(e) = sender.send(Message::Text(json)).await {
                        error!("Error sending to {}: {}", id, e);
                        break;
                    }
                }
                Err(RecvError::Lagged(count)) => {
                    warn!("Client {} lagged by {} samples", id, count);
                }
                Err(RecvError::Closed) => break,
            },
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    debug!("Client {} sent: {}", id, text);
                }
                Some(Ok(Message::Ping(data))) => {
                    if sender.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    debug!("Client {} sent close frame", id);
                    break;
                }
                Some(Ok(_)) => {
                    // Ignore binary and pong messages
                }
                Some(Err(e)) => {
                    error!("WebSocket error from {}: {}", id, e);
                    break;
                }
                None => break,
            },
            _ = closing.changed() => {
                info!("Closing client {} for shutdown", id);
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        }
    }

    state.unregister_client(id).await;
}

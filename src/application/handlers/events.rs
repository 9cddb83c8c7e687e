use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tracing::debug;

use crate::application::services::broadcast::Subscription;
use crate::application::state::AppState;

/// Upgrade to a WebSocket that streams live trade updates.
pub async fn live_events(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let registry = state.broadcaster.clone();
    ws.on_upgrade(move |socket| async move {
        let subscription = registry.register();
        let id = subscription.id;
        handle_socket(socket, subscription).await;
        registry.unregister(id);
    })
}

/// Forward queued updates until either side goes away.
async fn handle_socket(socket: WebSocket, subscription: Subscription) {
    let Subscription { id, mut receiver } = subscription;
    let (mut sender, mut incoming) = socket.split();

    if sender
        .send(Message::Text(r#"{"type":"connected"}"#.to_string()))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            update = receiver.recv() => match update {
                Some(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            frame = incoming.next() => match frame {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                // Pings are answered by axum; client text is ignored.
                Some(Ok(_)) => {}
            },
        }
    }

    debug!("Live client {} disconnected", id);
}

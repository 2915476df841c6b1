use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    dto::ws::ClientMessage,
    services::quiz_service,
    state::{SharedState, session::SessionId},
};

/// Handle the full lifecycle for an individual client WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if sender.send(message).await.is_err() || closing {
                break;
            }
        }
    });

    let session_id = quiz_service::client_connected(&state, outbound_tx.clone()).await;
    let idle_timeout = state.config().idle_timeout();

    loop {
        let next = match idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, receiver.next()).await {
                Ok(next) => next,
                Err(_) => {
                    info!(session = %session_id, "closing idle connection");
                    let _ = outbound_tx.send(Message::Close(None));
                    break;
                }
            },
            None => receiver.next().await,
        };

        let Some(message) = next else {
            break;
        };

        match message {
            Ok(Message::Text(text)) => {
                handle_text(&state, session_id, text.as_str()).await;
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(session = %session_id, "client closed connection");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {
                debug!(session = %session_id, "ignoring binary frame");
            }
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(session = %session_id, error = %err, "websocket error");
                break;
            }
        }
    }

    quiz_service::client_disconnected(&state, session_id).await;
    finalize(writer_task, outbound_tx).await;
}

/// Decode one text frame and hand it to the serialized dispatcher.
///
/// Malformed payloads are dropped; the connection stays open.
async fn handle_text(state: &SharedState, session_id: SessionId, text: &str) {
    match ClientMessage::from_json_str(text) {
        Ok(message) => {
            debug!(session = %session_id, message = message.kind(), "received client message");
            quiz_service::process_message(state, session_id, message).await;
        }
        Err(err) => {
            warn!(session = %session_id, error = %err, "failed to parse or validate client message");
        }
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

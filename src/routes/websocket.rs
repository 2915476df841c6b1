use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::Response,
    routing::get,
};

use crate::{services::websocket_service, state::SharedState};

/// Largest accepted client frame; a full `loadQuiz` fits comfortably.
const MAX_MESSAGE_BYTES: usize = 1 << 20;

#[utoipa::path(
    get,
    path = "/ws",
    tag = "quiz",
    responses((status = 101, description = "Switching protocols to the quiz WebSocket protocol"))
)]
/// Upgrade the HTTP connection into a quiz client session (host or player).
pub async fn ws_handler(State(state): State<SharedState>, ws: WebSocketUpgrade) -> Response {
    ws.max_message_size(MAX_MESSAGE_BYTES)
        .on_upgrade(move |socket| websocket_service::handle_socket(state, socket))
}

/// Client WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::new().route("/ws", get(ws_handler))
}

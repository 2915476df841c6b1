use axum::Router;

use crate::state::SharedState;

pub mod docs;
pub mod health;
pub mod public;
pub mod websocket;

/// Assemble every route tree (WebSocket, health, scoreboard, docs) over the shared state.
pub fn router(state: SharedState) -> Router<()> {
    Router::<SharedState>::new()
        .merge(websocket::router())
        .merge(health::router())
        .merge(public::router())
        .merge(docs::router())
        .with_state(state)
}

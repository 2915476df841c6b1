use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{
    dto::public::{ScoreEntry, ScoreboardResponse},
    error::AppError,
    services::public_service,
    state::SharedState,
};

/// Public read-only scoreboard endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/scoreboard", get(get_scoreboard))
        .route("/scoreboard/{name}", get(get_player_score))
}

#[utoipa::path(
    get,
    path = "/scoreboard",
    tag = "public",
    responses((status = 200, description = "Scores of every known player", body = ScoreboardResponse))
)]
/// Return every known player's score, highest first.
pub async fn get_scoreboard(State(state): State<SharedState>) -> Json<ScoreboardResponse> {
    Json(public_service::scoreboard(&state).await)
}

#[utoipa::path(
    get,
    path = "/scoreboard/{name}",
    tag = "public",
    params(("name" = String, Path, description = "Player name")),
    responses(
        (status = 200, description = "Score of the player", body = ScoreEntry),
        (status = 404, description = "Unknown player")
    )
)]
/// Return the score of a single player.
pub async fn get_player_score(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<Json<ScoreEntry>, AppError> {
    let entry = public_service::player_score(&state, &name).await?;
    Ok(Json(entry))
}

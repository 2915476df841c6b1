use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the quiz buzzer backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::public::get_scoreboard,
        crate::routes::public::get_player_score,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::public::ScoreEntry,
            crate::dto::public::ScoreboardResponse,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
            crate::dto::ws::QuizItem,
            crate::dto::ws::BuzzerStatus,
            crate::dto::ws::PlayerStatsEntry,
            crate::dto::ws::SubmittedAnswerEntry,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "public", description = "Read-only scoreboard"),
        (name = "quiz", description = "WebSocket protocol for hosts and players"),
    )
)]
pub struct ApiDoc;

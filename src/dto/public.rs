use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::ws::BuzzerStatus;

/// One line of the public scoreboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEntry {
    /// Player name.
    pub name: String,
    /// Cumulative score.
    pub total_score: i64,
    /// Whether the player currently has a connection.
    pub connected: bool,
}

/// Response listing every known player, highest score first.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoreboardResponse {
    /// Scores, highest first.
    pub players: Vec<ScoreEntry>,
    /// Buzzer phase.
    pub buzzer: BuzzerStatus,
    /// Whether storage is currently unavailable.
    pub degraded: bool,
}

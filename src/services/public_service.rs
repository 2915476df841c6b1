//! Read-only public projection of the scoreboard.

use std::collections::BTreeSet;

use crate::{
    dto::public::{ScoreEntry, ScoreboardResponse},
    error::ServiceError,
    services::broadcast,
    state::SharedState,
};

/// Every known player with their score, highest first, plus the buzzer phase.
pub async fn scoreboard(state: &SharedState) -> ScoreboardResponse {
    let quiz = state.quiz().lock().await;
    let connected: BTreeSet<String> = state.sessions().active_players().into_iter().collect();

    let players = broadcast::ranked_players(&quiz)
        .into_iter()
        .map(|record| ScoreEntry {
            name: record.name.clone(),
            total_score: record.stats.total_score,
            connected: connected.contains(&record.name),
        })
        .collect();

    ScoreboardResponse {
        players,
        buzzer: quiz.phase().into(),
        degraded: state.is_degraded(),
    }
}

/// Score line of a single player.
pub async fn player_score(state: &SharedState, name: &str) -> Result<ScoreEntry, ServiceError> {
    let quiz = state.quiz().lock().await;
    let record = quiz
        .ledger()
        .get(name)
        .ok_or_else(|| ServiceError::NotFound(format!("player `{name}` not found")))?;

    Ok(ScoreEntry {
        name: record.name.clone(),
        total_score: record.stats.total_score,
        connected: !state.sessions().sessions_for_player(name).is_empty(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{models::PlayerEntity, store::memory::MemoryStore},
        dto::ws::BuzzerStatus,
        state::{AppState, session::SessionRole},
    };

    fn player(name: &str, score: i64) -> PlayerEntity {
        PlayerEntity {
            name: name.into(),
            password: "pw".into(),
            total_score: score,
            correct_answers: 0,
            incorrect_answers: 0,
            total_questions_answered: 0,
        }
    }

    #[tokio::test]
    async fn lists_all_known_players_with_connection_flag() {
        let state = AppState::new(AppConfig::default());
        let store = MemoryStore::seeded(vec![player("amy", 2), player("bob", 10)], Vec::new());
        state.install_store(Arc::new(store)).await.unwrap();

        let (tx, _rx) = mpsc::unbounded_channel();
        let id = state.sessions().register(tx);
        state.sessions().set_role(id, SessionRole::Player("amy".into()));

        let board = scoreboard(&state).await;
        assert_eq!(
            board.players,
            vec![
                ScoreEntry {
                    name: "bob".into(),
                    total_score: 10,
                    connected: false,
                },
                ScoreEntry {
                    name: "amy".into(),
                    total_score: 2,
                    connected: true,
                },
            ]
        );
        assert_eq!(board.buzzer, BuzzerStatus::Closed);
        assert!(!board.degraded);
    }

    #[tokio::test]
    async fn unknown_player_is_not_found() {
        let state = AppState::new(AppConfig::default());
        let store = MemoryStore::seeded(vec![player("amy", 2)], Vec::new());
        state.install_store(Arc::new(store)).await.unwrap();

        assert_eq!(player_score(&state, "amy").await.unwrap().total_score, 2);
        assert!(matches!(
            player_score(&state, "zed").await,
            Err(ServiceError::NotFound(_))
        ));
    }
}

//! Scoring engine: computes ledger changes, persists them, and only then commits them in memory.

use tracing::{info, warn};

use crate::{
    error::ServiceError,
    state::{
        AppState,
        buzzer::BuzzerEvent,
        game::QuizSession,
        ledger::{Adjudication, LedgerChange},
        transitions::{bounded, run_transition},
    },
};

/// What happened when the host adjudicated the buzzed-in answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjudicationOutcome {
    /// Player who held the buzz.
    pub name: String,
    /// Whether the answer was judged correct.
    pub correct: bool,
    /// Score delta applied to that player.
    pub awarded: i64,
    /// Players who received the consolation points.
    pub consoled: Vec<String>,
}

/// Durably write a ledger change through the installed store.
async fn persist_change(state: &AppState, change: &LedgerChange) -> Result<(), ServiceError> {
    bounded(state.transition_timeout(), write_change(state, change)).await
}

/// Persist `change`, then commit it to the ledger.
///
/// On failure the touched players are re-read, since backends write records one by one and a
/// failed or timed-out write may still have landed in part.
pub async fn persist_and_commit(
    state: &AppState,
    quiz: &mut QuizSession,
    change: LedgerChange,
) -> Result<(), ServiceError> {
    match persist_change(state, &change).await {
        Ok(()) => {
            quiz.ledger_mut().commit(change);
            Ok(())
        }
        Err(err) => {
            reconcile(state, quiz, &change, &err).await;
            Err(err)
        }
    }
}

/// Align the ledger with the store after `change` failed to persist.
async fn reconcile(
    state: &AppState,
    quiz: &mut QuizSession,
    change: &LedgerChange,
    err: &ServiceError,
) {
    // Degraded means the write was never attempted.
    if !err.is_storage_failure() || matches!(err, ServiceError::Degraded) {
        return;
    }
    let Some(store) = state.store().await else {
        return;
    };

    let reread = async {
        let entities = match change {
            LedgerChange::Upsert(records) => {
                let mut found = Vec::with_capacity(records.len());
                for record in records {
                    if let Some(entity) = store.find_player(record.name.clone()).await? {
                        found.push(entity);
                    }
                }
                found
            }
            LedgerChange::ResetAll => store.list_players().await?,
        };
        Ok::<_, ServiceError>(entities)
    };

    match bounded(state.transition_timeout(), reread).await {
        Ok(entities) => {
            info!(players = entities.len(), "re-read players after a failed write");
            quiz.ledger_mut().commit(LedgerChange::Upsert(
                entities.into_iter().map(Into::into).collect(),
            ));
        }
        Err(reread_err) => {
            warn!(
                error = %reread_err,
                "could not re-read players after a failed write; ledger waits for the next hydration"
            );
        }
    }
}

async fn write_change(state: &AppState, change: &LedgerChange) -> Result<(), ServiceError> {
    match change {
        LedgerChange::Upsert(records) if records.is_empty() => Ok(()),
        LedgerChange::Upsert(_) => {
            let store = state.require_store().await?;
            store.save_players(change.entities()).await?;
            Ok(())
        }
        LedgerChange::ResetAll => {
            let store = state.require_store().await?;
            store.reset_all_stats().await?;
            Ok(())
        }
    }
}

/// Score the buzzed-in answer and reopen the buzzer.
///
/// A correct answer awards `points` when given and positive, otherwise the configured default.
/// When persistence fails the buzzer stays untouched and the ledger keeps only what reached the
/// store.
pub async fn adjudicate(
    state: &AppState,
    quiz: &mut QuizSession,
    correct: bool,
    points: Option<i64>,
) -> Result<AdjudicationOutcome, ServiceError> {
    let name = quiz
        .phase()
        .buzzed_in()
        .map(str::to_owned)
        .ok_or_else(|| ServiceError::InvalidState("no player holds the buzz".into()))?;

    let config = state.config();
    let rules = config.scoring();
    let award = points
        .filter(|points| *points > 0)
        .unwrap_or(rules.correct_points);
    // A host buzz never moves a score.
    let adjudication = if name == config.host().name {
        Adjudication {
            change: LedgerChange::Upsert(Vec::new()),
            awarded: 0,
            consoled: Vec::new(),
            credits: Vec::new(),
        }
    } else {
        quiz.ledger().adjudicate(
            &name,
            correct,
            award,
            rules,
            quiz.roster(),
            &config.host().name,
        )?
    };

    let change = adjudication.change.clone();
    let persisted = run_transition(
        quiz,
        BuzzerEvent::Adjudicate { correct },
        None,
        persist_change(state, &change),
    )
    .await;
    if let Err(err) = persisted {
        reconcile(state, quiz, &change, &err).await;
        return Err(err);
    }
    quiz.ledger_mut().commit(adjudication.change);
    for (player, delta) in &adjudication.credits {
        quiz.credit_round(player, *delta);
    }

    info!(
        player = %name,
        correct,
        awarded = adjudication.awarded,
        consoled = adjudication.consoled.len(),
        "answer adjudicated"
    );

    Ok(AdjudicationOutcome {
        name,
        correct,
        awarded: adjudication.awarded,
        consoled: adjudication.consoled,
    })
}

/// Set a player's score to an absolute value, logging the applied delta.
pub async fn manual_score_change(
    state: &AppState,
    quiz: &mut QuizSession,
    name: &str,
    new_score: i64,
) -> Result<(), ServiceError> {
    let (change, delta) = quiz.ledger().set_score(name, new_score)?;
    persist_and_commit(state, quiz, change).await?;
    quiz.credit_round(name, delta);
    info!(player = %name, delta, new_score, "manual score change");
    Ok(())
}

/// Zero every player's counters.
pub async fn reset_all_stats(state: &AppState, quiz: &mut QuizSession) -> Result<(), ServiceError> {
    persist_and_commit(state, quiz, LedgerChange::ResetAll).await?;
    info!(players = quiz.ledger().len(), "all player stats reset");
    Ok(())
}

/// Clear the round tally. Persisted counters are left alone.
pub fn reset_round_points(quiz: &mut QuizSession) {
    quiz.reset_round_points();
    info!("round points reset");
}

//! Authenticator resolving a credential pair to a session role.

use tracing::{debug, info};

use crate::{
    config::RegistrationPolicy,
    dto::validation::validate_player_name,
    error::ServiceError,
    services::scoring_service::persist_and_commit,
    state::{AppState, game::QuizSession, ledger::LedgerChange, transitions::bounded},
};

/// Result of checking a credential pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The pair denotes the host.
    Host,
    /// The pair denotes this player.
    Player(String),
    /// The pair was refused.
    Rejected,
}

/// Check `name`/`password` against the host identity, then against the player records.
///
/// Unknown names are registered when the registration policy is open. Player logins need the
/// player store, so they fail with a storage error in degraded mode; host logins never do.
pub async fn authenticate(
    state: &AppState,
    quiz: &mut QuizSession,
    name: &str,
    password: &str,
) -> Result<AuthOutcome, ServiceError> {
    let config = state.config();
    let host = config.host();
    if host.matches(name, password) {
        return Ok(AuthOutcome::Host);
    }
    if name == host.name {
        debug!("rejected host login with wrong password");
        return Ok(AuthOutcome::Rejected);
    }
    if let Err(err) = validate_player_name(name) {
        debug!(error = %err, "rejected login with invalid name");
        return Ok(AuthOutcome::Rejected);
    }

    let store = state.require_store().await?;

    if quiz.ledger().get(name).is_none() {
        // Records created behind our back (e.g. an edited data file) are adopted on first login.
        let lookup = async { Ok::<_, ServiceError>(store.find_player(name.to_owned()).await?) };
        if let Some(entity) = bounded(state.transition_timeout(), lookup).await? {
            quiz.ledger_mut()
                .commit(LedgerChange::Upsert(vec![entity.into()]));
        }
    }

    match quiz.ledger().get(name) {
        Some(record) if record.credential == password => Ok(AuthOutcome::Player(name.to_owned())),
        Some(_) => {
            debug!(player = %name, "rejected player login with wrong password");
            Ok(AuthOutcome::Rejected)
        }
        None if config.registration() == RegistrationPolicy::Open => {
            let change = quiz.ledger().register(name, password)?;
            persist_and_commit(state, quiz, change).await?;
            info!(player = %name, "registered new player");
            Ok(AuthOutcome::Player(name.to_owned()))
        }
        None => {
            debug!(player = %name, "rejected unknown player while registration is closed");
            Ok(AuthOutcome::Rejected)
        }
    }
}

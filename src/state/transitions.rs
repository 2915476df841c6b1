use std::{future::Future, time::Duration};

use tokio::time::timeout;
use tracing::warn;

use crate::error::ServiceError;

use super::{
    buzzer::{BuzzerEvent, Plan},
    game::QuizSession,
};

/// Plan a buzzer transition, run the fallible `work` (usually persistence), then apply the plan
/// on success or abort it on failure or timeout, leaving the buzzer untouched.
pub async fn run_transition<Fut, T>(
    session: &mut QuizSession,
    event: BuzzerEvent,
    limit: Option<Duration>,
    work: Fut,
) -> Result<(T, Plan), ServiceError>
where
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let Plan { id: plan_id, .. } = session.buzzer_mut().plan(event.clone())?;

    match bounded(limit, work).await {
        Ok(value) => {
            let plan = session.apply_plan(plan_id)?;
            Ok((value, plan))
        }
        Err(err) => {
            if let Err(abort_err) = session.buzzer_mut().abort(plan_id) {
                warn!(
                    event = ?event,
                    plan_id = %plan_id,
                    error = ?abort_err,
                    "failed to abort transition after work error"
                );
            }
            Err(err)
        }
    }
}

/// Await `work`, failing with [`ServiceError::Timeout`] when it exceeds `limit`.
pub async fn bounded<Fut, T>(limit: Option<Duration>, work: Fut) -> Result<T, ServiceError>
where
    Fut: Future<Output = Result<T, ServiceError>>,
{
    match limit {
        Some(limit) => timeout(limit, work)
            .await
            .map_err(|_| ServiceError::Timeout)?,
        None => work.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::buzzer::{BuzzerPhase, CloseKind};

    #[tokio::test]
    async fn successful_work_applies_the_plan() {
        let mut session = QuizSession::new();
        let (value, plan) = run_transition(&mut session, BuzzerEvent::Reset, None, async {
            Ok::<_, ServiceError>(7)
        })
        .await
        .unwrap();

        assert_eq!(value, 7);
        assert_eq!(plan.to, BuzzerPhase::Open);
        assert!(session.phase().is_open());
    }

    #[tokio::test]
    async fn failed_work_aborts_the_plan() {
        let mut session = QuizSession::new();
        let err = run_transition(&mut session, BuzzerEvent::Reset, None, async {
            Err::<(), _>(ServiceError::Degraded)
        })
        .await
        .unwrap_err();

        assert!(matches!(err, ServiceError::Degraded));
        assert_eq!(session.phase(), &BuzzerPhase::Closed(CloseKind::Manual));
        assert!(session.buzzer().pending().is_none());
    }

    #[tokio::test]
    async fn slow_work_times_out_and_aborts() {
        let mut session = QuizSession::new();
        let err = run_transition(
            &mut session,
            BuzzerEvent::Reset,
            Some(Duration::from_millis(10)),
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, ServiceError>(())
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ServiceError::Timeout));
        assert!(!session.phase().is_open());
        assert!(session.buzzer().pending().is_none());
    }

    #[tokio::test]
    async fn invalid_transition_never_runs_work() {
        let mut session = QuizSession::new();
        let err = run_transition(
            &mut session,
            BuzzerEvent::Buzz {
                name: "alice".into(),
            },
            Some(Duration::from_millis(10)),
            std::future::pending::<Result<(), ServiceError>>(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ServiceError::InvalidState(_)));
    }
}

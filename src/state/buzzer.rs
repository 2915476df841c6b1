use thiserror::Error;
use uuid::Uuid;

/// Whether a buzz attempt can currently succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuzzerPhase {
    /// Accepting a buzz.
    Open,
    /// Not accepting buzzes, either after a buzz or because the host closed it.
    Closed(CloseKind),
}

/// Represents why the buzzer is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseKind {
    /// The host closed the buzzer without anyone buzzing.
    Manual,
    /// A player won the buzz race.
    Buzz {
        /// Name of the player holding the buzz.
        name: String,
    },
}

impl BuzzerPhase {
    /// Whether the buzzer is open.
    pub fn is_open(&self) -> bool {
        matches!(self, BuzzerPhase::Open)
    }

    /// Name of the player holding the buzz, if the buzzer was closed by a buzz.
    pub fn buzzed_in(&self) -> Option<&str> {
        match self {
            BuzzerPhase::Closed(CloseKind::Buzz { name }) => Some(name.as_str()),
            _ => None,
        }
    }
}

/// Events that can be applied to the buzzer state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuzzerEvent {
    /// A client claims the right to answer first.
    Buzz {
        /// Name of the buzzing client.
        name: String,
    },
    /// Host opens (or re-opens) the buzzer, clearing the round.
    Reset,
    /// Host closes the buzzer without a buzz.
    Close,
    /// Host adjudicated the buzzed-in answer.
    Adjudicate {
        /// Whether the answer was judged correct.
        correct: bool,
    },
    /// Host moved to another question.
    QuestionChanged,
    /// Host replaced the quiz.
    QuizLoaded,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: BuzzerPhase,
    /// The event that cannot be applied from this phase.
    pub event: BuzzerEvent,
}

/// Errors that can occur when planning a state machine transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    #[error("a buzzer transition is already pending")]
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    #[error(transparent)]
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// No transition is currently pending.
    #[error("no buzzer transition is pending")]
    NoPending,
    /// Plan ID does not match the pending plan.
    #[error("pending buzzer transition is {expected}, not {got}")]
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Errors that can occur when aborting a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbortError {
    /// No transition is currently pending.
    #[error("no buzzer transition to abort")]
    NoPending,
    /// Plan ID does not match the pending plan.
    #[error("cannot abort {got}: pending buzzer transition is {expected}")]
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A planned transition that has been validated but not yet applied.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the state machine is currently in.
    pub from: BuzzerPhase,
    /// Phase the state machine will transition to.
    pub to: BuzzerPhase,
    /// Event that triggered this transition.
    pub event: BuzzerEvent,
}

impl Plan {
    /// Whether applying this plan starts a fresh answering round.
    pub fn clears_answers(&self) -> bool {
        match self.event {
            BuzzerEvent::Buzz { .. } => false,
            BuzzerEvent::Close => true,
            _ => self.to.is_open(),
        }
    }
}

/// The single global buzzer. Exactly one buzz can hold it at a time.
#[derive(Debug, Clone)]
pub struct BuzzerStateMachine {
    phase: BuzzerPhase,
    pending: Option<Plan>,
}

impl Default for BuzzerStateMachine {
    fn default() -> Self {
        Self {
            phase: BuzzerPhase::Closed(CloseKind::Manual),
            pending: None,
        }
    }
}

impl BuzzerStateMachine {
    /// Create a buzzer closed by the host, waiting for the first question to be opened.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> &BuzzerPhase {
        &self.phase
    }

    /// Phase a planned but not yet applied transition leads to.
    pub fn pending(&self) -> Option<&BuzzerPhase> {
        self.pending.as_ref().map(|plan| &plan.to)
    }

    /// Plan a transition by validating that the event can be applied from the current phase.
    /// Returns a Plan that can later be applied or aborted.
    pub fn plan(&mut self, event: BuzzerEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event.clone())
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase.clone(),
            to: next,
            event,
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition, moving the state machine to the next phase.
    /// Returns the applied plan.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<Plan, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected,
                got: plan_id,
            });
        }

        self.phase = plan.to.clone();

        Ok(plan)
    }

    /// Abort a planned transition without applying it, leaving the phase untouched.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: BuzzerEvent) -> Result<BuzzerPhase, InvalidTransition> {
        let next = match (&self.phase, &event) {
            // First writer wins; later attempts see a closed buzzer.
            (BuzzerPhase::Open, BuzzerEvent::Buzz { name }) => {
                BuzzerPhase::Closed(CloseKind::Buzz { name: name.clone() })
            }
            (_, BuzzerEvent::Reset) => BuzzerPhase::Open,
            (BuzzerPhase::Open | BuzzerPhase::Closed(CloseKind::Manual), BuzzerEvent::Close) => {
                BuzzerPhase::Closed(CloseKind::Manual)
            }
            (BuzzerPhase::Closed(CloseKind::Buzz { .. }), BuzzerEvent::Adjudicate { .. }) => {
                BuzzerPhase::Open
            }
            (_, BuzzerEvent::QuestionChanged | BuzzerEvent::QuizLoaded) => BuzzerPhase::Open,
            (from, _) => {
                return Err(InvalidTransition {
                    from: from.clone(),
                    event: event.clone(),
                });
            }
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut BuzzerStateMachine, event: BuzzerEvent) -> BuzzerPhase {
        let plan = sm.plan(event).unwrap();
        sm.apply(plan.id).unwrap().to
    }

    fn buzz(name: &str) -> BuzzerEvent {
        BuzzerEvent::Buzz { name: name.into() }
    }

    #[test]
    fn initial_state_is_manually_closed() {
        let sm = BuzzerStateMachine::new();
        assert_eq!(sm.phase(), &BuzzerPhase::Closed(CloseKind::Manual));
        assert_eq!(sm.phase().buzzed_in(), None);
    }

    #[test]
    fn full_round_through_buzz_and_adjudication() {
        let mut sm = BuzzerStateMachine::new();

        assert_eq!(apply(&mut sm, BuzzerEvent::Reset), BuzzerPhase::Open);
        assert_eq!(
            apply(&mut sm, buzz("alice")),
            BuzzerPhase::Closed(CloseKind::Buzz {
                name: "alice".into()
            })
        );
        assert_eq!(sm.phase().buzzed_in(), Some("alice"));
        assert_eq!(
            apply(&mut sm, BuzzerEvent::Adjudicate { correct: true }),
            BuzzerPhase::Open
        );
        assert!(sm.pending().is_none());
    }

    #[test]
    fn second_buzz_while_closed_is_rejected() {
        let mut sm = BuzzerStateMachine::new();
        apply(&mut sm, BuzzerEvent::Reset);
        apply(&mut sm, buzz("alice"));

        let err = sm.plan(buzz("bob")).unwrap_err();
        match err {
            PlanError::InvalidTransition(invalid) => {
                assert_eq!(invalid.event, buzz("bob"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(sm.phase().buzzed_in(), Some("alice"));
    }

    #[test]
    fn buzz_on_manually_closed_buzzer_is_rejected() {
        let mut sm = BuzzerStateMachine::new();
        assert!(matches!(
            sm.plan(buzz("alice")),
            Err(PlanError::InvalidTransition(_))
        ));
    }

    #[test]
    fn reset_is_idempotent() {
        let mut sm = BuzzerStateMachine::new();
        apply(&mut sm, BuzzerEvent::Reset);
        apply(&mut sm, buzz("alice"));

        assert_eq!(apply(&mut sm, BuzzerEvent::Reset), BuzzerPhase::Open);
        assert_eq!(apply(&mut sm, BuzzerEvent::Reset), BuzzerPhase::Open);
        assert_eq!(sm.phase().buzzed_in(), None);
    }

    #[test]
    fn manual_close_cannot_steal_an_active_buzz() {
        let mut sm = BuzzerStateMachine::new();
        apply(&mut sm, BuzzerEvent::Reset);
        assert_eq!(
            apply(&mut sm, BuzzerEvent::Close),
            BuzzerPhase::Closed(CloseKind::Manual)
        );
        apply(&mut sm, BuzzerEvent::Reset);
        apply(&mut sm, buzz("alice"));

        assert!(sm.plan(BuzzerEvent::Close).is_err());
    }

    #[test]
    fn adjudication_requires_a_buzz() {
        let mut sm = BuzzerStateMachine::new();
        apply(&mut sm, BuzzerEvent::Reset);
        assert!(
            sm.plan(BuzzerEvent::Adjudicate { correct: false })
                .is_err()
        );
    }

    #[test]
    fn question_change_reopens_from_any_phase() {
        let mut sm = BuzzerStateMachine::new();
        assert_eq!(apply(&mut sm, BuzzerEvent::QuestionChanged), BuzzerPhase::Open);
        apply(&mut sm, buzz("carol"));
        assert_eq!(apply(&mut sm, BuzzerEvent::QuizLoaded), BuzzerPhase::Open);
    }

    #[test]
    fn pending_plan_blocks_new_plans_until_aborted() {
        let mut sm = BuzzerStateMachine::new();
        apply(&mut sm, BuzzerEvent::Reset);
        apply(&mut sm, buzz("alice"));

        let plan = sm.plan(BuzzerEvent::Adjudicate { correct: true }).unwrap();
        assert_eq!(sm.plan(BuzzerEvent::Reset).unwrap_err(), PlanError::AlreadyPending);
        assert_eq!(sm.pending(), Some(&BuzzerPhase::Open));

        sm.abort(plan.id).unwrap();
        assert!(sm.pending.is_none());
        assert_eq!(sm.phase().buzzed_in(), Some("alice"));
    }

    #[test]
    fn apply_with_unknown_plan_keeps_pending() {
        let mut sm = BuzzerStateMachine::new();
        let plan = sm.plan(BuzzerEvent::Reset).unwrap();

        let err = sm.apply(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, ApplyError::IdMismatch { expected, .. } if expected == plan.id));
        assert!(sm.apply(plan.id).is_ok());
    }

    #[test]
    fn clears_answers_on_reset_close_and_question_change() {
        let mut sm = BuzzerStateMachine::new();
        let plan = sm.plan(BuzzerEvent::Reset).unwrap();
        assert!(plan.clears_answers());
        sm.apply(plan.id).unwrap();

        let plan = sm.plan(buzz("alice")).unwrap();
        assert!(!plan.clears_answers());
        sm.apply(plan.id).unwrap();

        let plan = sm.plan(BuzzerEvent::QuestionChanged).unwrap();
        assert!(plan.clears_answers());
        sm.apply(plan.id).unwrap();

        let plan = sm.plan(BuzzerEvent::Close).unwrap();
        assert!(plan.clears_answers());
    }
}

use indexmap::{IndexMap, IndexSet};

use crate::dao::models::{PlayerEntity, QuestionEntity};

use super::{
    buzzer::{ApplyError, BuzzerPhase, BuzzerStateMachine, Plan, PlanId},
    ledger::Ledger,
};

/// A quiz question as seen by the running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Text shown to every client.
    pub prompt: String,
    /// Expected answer, only ever sent to the host.
    pub expected_answer: String,
}

impl From<QuestionEntity> for Question {
    fn from(value: QuestionEntity) -> Self {
        Self {
            prompt: value.question,
            expected_answer: value.answer,
        }
    }
}

impl From<Question> for QuestionEntity {
    fn from(value: Question) -> Self {
        Self {
            question: value.prompt,
            answer: value.expected_answer,
        }
    }
}

/// Latest finalized answer of a player for the current round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedAnswer {
    /// Raw answer text.
    pub answer: String,
    /// Auto-grading hint against the current question's expected answer.
    pub matches_expected: bool,
}

/// Global quiz state: buzzer, questions, answers of the current round, the score ledger and the
/// round tally.
///
/// The round tally counts points earned since the host last cleared it. It lives only in memory
/// and never touches the persisted counters.
#[derive(Debug, Default)]
pub struct QuizSession {
    buzzer: BuzzerStateMachine,
    questions: Vec<Question>,
    current_question_index: usize,
    submitted_answers: IndexMap<String, SubmittedAnswer>,
    live_answers: IndexMap<String, String>,
    ledger: Ledger,
    roster: IndexSet<String>,
    round_points: IndexMap<String, i64>,
}

impl QuizSession {
    /// Fresh session with no players, no questions and a manually closed buzzer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the ledger and question list with freshly loaded storage content.
    pub fn hydrate(&mut self, players: Vec<PlayerEntity>, questions: Vec<QuestionEntity>) {
        self.ledger = Ledger::from_entities(players);
        self.questions = questions.into_iter().map(Question::from).collect();
        self.current_question_index = self.clamp_index(self.current_question_index);
    }

    /// Buzzer state machine.
    pub fn buzzer(&self) -> &BuzzerStateMachine {
        &self.buzzer
    }

    pub(crate) fn buzzer_mut(&mut self) -> &mut BuzzerStateMachine {
        &mut self.buzzer
    }

    /// Current buzzer phase.
    pub fn phase(&self) -> &BuzzerPhase {
        self.buzzer.phase()
    }

    /// Apply a planned buzzer transition, clearing the round's answers when it starts a new one.
    pub fn apply_plan(&mut self, plan_id: PlanId) -> Result<Plan, ApplyError> {
        let plan = self.buzzer.apply(plan_id)?;
        if plan.clears_answers() {
            self.clear_answers();
        }
        Ok(plan)
    }

    /// Loaded questions in quiz order.
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Cursor into [`Self::questions`].
    pub fn current_question_index(&self) -> usize {
        self.current_question_index
    }

    /// Question under the cursor, if any is loaded.
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_question_index)
    }

    /// Index the cursor would move to on `nextQuestion`, clamped to the last question.
    pub fn next_index(&self) -> usize {
        self.clamp_index(self.current_question_index.saturating_add(1))
    }

    /// Index the cursor would move to on `prevQuestion`, clamped to the first question.
    pub fn prev_index(&self) -> usize {
        self.clamp_index(self.current_question_index.saturating_sub(1))
    }

    /// Move the cursor, clamping to the loaded range.
    pub fn set_question_index(&mut self, index: usize) {
        self.current_question_index = self.clamp_index(index);
    }

    /// Swap in a new quiz and rewind the cursor.
    pub fn replace_questions(&mut self, questions: Vec<Question>) {
        self.questions = questions;
        self.current_question_index = 0;
    }

    fn clamp_index(&self, index: usize) -> usize {
        index.min(self.questions.len().saturating_sub(1))
    }

    /// Record a player's finalized answer, replacing any earlier one from this round.
    pub fn record_submission(&mut self, name: &str, answer: String) -> &SubmittedAnswer {
        let matches_expected = self
            .current_question()
            .is_some_and(|question| matches_expected(&answer, &question.expected_answer));
        self.live_answers.shift_remove(name);
        self.submitted_answers.insert(
            name.to_owned(),
            SubmittedAnswer {
                answer,
                matches_expected,
            },
        );
        &self.submitted_answers[name]
    }

    /// Record a player's in-progress answer text.
    pub fn record_live(&mut self, name: &str, text: String) {
        self.live_answers.insert(name.to_owned(), text);
    }

    /// Forget every answer of the current round.
    pub fn clear_answers(&mut self) {
        self.submitted_answers.clear();
        self.live_answers.clear();
    }

    /// Finalized answers of the current round, in submission order.
    pub fn submitted_answers(&self) -> &IndexMap<String, SubmittedAnswer> {
        &self.submitted_answers
    }

    /// In-progress answers of the current round.
    pub fn live_answers(&self) -> &IndexMap<String, String> {
        &self.live_answers
    }

    /// Score ledger mirroring the player store.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub(crate) fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }

    /// Players who logged in since the process started.
    pub fn roster(&self) -> impl Iterator<Item = &str> {
        self.roster.iter().map(String::as_str)
    }

    /// Points `name` earned since the round tally was last cleared.
    pub fn round_points(&self, name: &str) -> i64 {
        self.round_points.get(name).copied().unwrap_or_default()
    }

    /// Add a committed score delta to the round tally.
    pub fn credit_round(&mut self, name: &str, delta: i64) {
        let entry = self.round_points.entry(name.to_owned()).or_default();
        *entry = entry.saturating_add(delta);
    }

    /// Zero the round tally of every player.
    pub fn reset_round_points(&mut self) {
        self.round_points.clear();
    }

    /// Add a player to the round roster.
    pub fn join_roster(&mut self, name: &str) {
        if !self.roster.contains(name) {
            self.roster.insert(name.to_owned());
        }
    }
}

/// Trimmed, case-insensitive comparison used as an auto-grading hint.
pub fn matches_expected(answer: &str, expected: &str) -> bool {
    let expected = expected.trim();
    !expected.is_empty() && answer.trim().to_lowercase() == expected.to_lowercase()
}

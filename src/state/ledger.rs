use indexmap::IndexMap;
use thiserror::Error;

use crate::{config::ScoringRules, dao::models::PlayerEntity};

/// Counters tracked for every player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerStats {
    /// Cumulative score, may go negative.
    pub total_score: i64,
    /// Answers adjudicated correct.
    pub correct_answers: u32,
    /// Answers adjudicated incorrect.
    pub incorrect_answers: u32,
    /// Questions answered; not strictly `correct + incorrect`.
    pub total_questions_answered: u32,
}

/// Player identity, credential and counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRecord {
    /// Unique, case-sensitive name.
    pub name: String,
    /// Opaque credential.
    pub credential: String,
    /// Score and answer counters.
    pub stats: PlayerStats,
}

impl PlayerRecord {
    /// Fresh record with zeroed counters.
    pub fn new(name: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            credential: credential.into(),
            stats: PlayerStats::default(),
        }
    }
}

/// Errors raised while computing a ledger change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// No player with this name exists.
    #[error("unknown player `{0}`")]
    UnknownPlayer(String),
    /// A player with this name already exists.
    #[error("player `{0}` already exists")]
    AlreadyExists(String),
    /// The change would push a score outside the representable range.
    #[error("score of `{0}` out of range")]
    ScoreOutOfRange(String),
}

/// A validated but not yet committed modification of the ledger.
///
/// Changes are computed from the current records, persisted, and only then committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerChange {
    /// Insert or replace these records.
    Upsert(Vec<PlayerRecord>),
    /// Zero the counters of every record.
    ResetAll,
}

impl LedgerChange {
    /// Records to hand to the player store for an upsert.
    pub fn entities(&self) -> Vec<PlayerEntity> {
        match self {
            LedgerChange::Upsert(records) => records.iter().cloned().map(Into::into).collect(),
            LedgerChange::ResetAll => Vec::new(),
        }
    }
}

/// Result of adjudicating a buzzed-in answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adjudication {
    /// Records to persist before the outcome becomes visible.
    pub change: LedgerChange,
    /// Score delta applied to the buzzed-in player.
    pub awarded: i64,
    /// Players who received the consolation point.
    pub consoled: Vec<String>,
    /// Score delta of every touched player, for the round tally.
    pub credits: Vec<(String, i64)>,
}

/// In-memory mirror of the player store, in registration order.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    players: IndexMap<String, PlayerRecord>,
}

impl Ledger {
    /// Build a ledger from persisted records.
    pub fn from_entities(entities: Vec<PlayerEntity>) -> Self {
        Self {
            players: entities
                .into_iter()
                .map(|entity| (entity.name.clone(), entity.into()))
                .collect(),
        }
    }

    /// Look up a player by exact name.
    pub fn get(&self, name: &str) -> Option<&PlayerRecord> {
        self.players.get(name)
    }

    /// Iterate over every known player in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &PlayerRecord> {
        self.players.values()
    }

    /// Number of known players.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether no player is known.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Prepare the creation of a new player.
    pub fn register(&self, name: &str, credential: &str) -> Result<LedgerChange, LedgerError> {
        if self.players.contains_key(name) {
            return Err(LedgerError::AlreadyExists(name.to_owned()));
        }
        Ok(LedgerChange::Upsert(vec![PlayerRecord::new(name, credential)]))
    }

    /// Apply the adjudication rules to the buzzed-in player and the rest of the roster.
    ///
    /// A correct answer awards `award` points and counts a correct answer. A wrong answer counts
    /// an incorrect answer, deducts the configured penalty, and gives every other roster player
    /// except `host_name` the consolation points without touching their counters. Names missing
    /// from the ledger are skipped.
    pub fn adjudicate<'a>(
        &self,
        buzzed: &str,
        correct: bool,
        award: i64,
        rules: ScoringRules,
        roster: impl IntoIterator<Item = &'a str>,
        host_name: &str,
    ) -> Result<Adjudication, LedgerError> {
        let mut updated = Vec::new();
        let mut credits = Vec::new();
        let awarded = if correct {
            award
        } else {
            rules
                .wrong_answer_penalty
                .checked_neg()
                .ok_or_else(|| LedgerError::ScoreOutOfRange(buzzed.to_owned()))?
        };

        if let Some(record) = self.players.get(buzzed) {
            let mut record = record.clone();
            let stats = &mut record.stats;
            stats.total_score = shifted(buzzed, stats.total_score, awarded)?;
            stats.total_questions_answered = stats.total_questions_answered.saturating_add(1);
            if correct {
                stats.correct_answers = stats.correct_answers.saturating_add(1);
            } else {
                stats.incorrect_answers = stats.incorrect_answers.saturating_add(1);
            }
            credits.push((record.name.clone(), awarded));
            updated.push(record);
        }

        let mut consoled = Vec::new();
        if !correct {
            for name in roster {
                if name == buzzed || name == host_name {
                    continue;
                }
                if let Some(record) = self.players.get(name) {
                    let mut record = record.clone();
                    record.stats.total_score =
                        shifted(name, record.stats.total_score, rules.consolation_points)?;
                    consoled.push(record.name.clone());
                    credits.push((record.name.clone(), rules.consolation_points));
                    updated.push(record);
                }
            }
        }

        Ok(Adjudication {
            change: LedgerChange::Upsert(updated),
            awarded,
            consoled,
            credits,
        })
    }

    /// Prepare setting a player's score to an absolute value, returning the change and delta.
    pub fn set_score(&self, name: &str, new_score: i64) -> Result<(LedgerChange, i64), LedgerError> {
        let record = self
            .players
            .get(name)
            .ok_or_else(|| LedgerError::UnknownPlayer(name.to_owned()))?;
        let delta = new_score
            .checked_sub(record.stats.total_score)
            .ok_or_else(|| LedgerError::ScoreOutOfRange(name.to_owned()))?;
        let mut record = record.clone();
        record.stats.total_score = new_score;
        Ok((LedgerChange::Upsert(vec![record]), delta))
    }

    /// Commit a change that has been durably persisted.
    pub fn commit(&mut self, change: LedgerChange) {
        match change {
            LedgerChange::Upsert(records) => {
                for record in records {
                    self.players.insert(record.name.clone(), record);
                }
            }
            LedgerChange::ResetAll => {
                for record in self.players.values_mut() {
                    record.stats = PlayerStats::default();
                }
            }
        }
    }
}

fn shifted(name: &str, score: i64, delta: i64) -> Result<i64, LedgerError> {
    score
        .checked_add(delta)
        .ok_or_else(|| LedgerError::ScoreOutOfRange(name.to_owned()))
}

impl From<PlayerEntity> for PlayerRecord {
    fn from(value: PlayerEntity) -> Self {
        Self {
            name: value.name,
            credential: value.password,
            stats: PlayerStats {
                total_score: value.total_score,
                correct_answers: value.correct_answers,
                incorrect_answers: value.incorrect_answers,
                total_questions_answered: value.total_questions_answered,
            },
        }
    }
}

impl From<PlayerRecord> for PlayerEntity {
    fn from(value: PlayerRecord) -> Self {
        Self {
            name: value.name,
            password: value.credential,
            total_score: value.stats.total_score,
            correct_answers: value.stats.correct_answers,
            incorrect_answers: value.stats.incorrect_answers,
            total_questions_answered: value.stats.total_questions_answered,
        }
    }
}

use serde::{Deserialize, Serialize};

/// Player record as persisted by the storage layer.
///
/// Field names follow the `playerData.json` layout so existing data files load unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEntity {
    /// Unique, case-sensitive player name (primary key).
    pub name: String,
    /// Opaque credential compared for equality on login.
    pub password: String,
    /// Cumulative score, may go negative.
    #[serde(default)]
    pub total_score: i64,
    /// Number of answers adjudicated correct.
    #[serde(default)]
    pub correct_answers: u32,
    /// Number of answers adjudicated incorrect.
    #[serde(default)]
    pub incorrect_answers: u32,
    /// Number of questions answered.
    #[serde(default)]
    pub total_questions_answered: u32,
}

/// Quiz question as persisted by the storage layer (`quiz.json` layout).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Prompt shown to every client.
    pub question: String,
    /// Expected answer, only ever sent to hosts.
    pub answer: String,
}

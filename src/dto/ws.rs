use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidationError;

use crate::dto::validation::{validate_answer_text, validate_question_prompt, validate_score};

/// Errors raised while decoding an inbound WebSocket frame.
#[derive(Debug, Error)]
pub enum MessageError {
    /// Frame is not a JSON object matching any message shape.
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    /// Frame parsed but carries invalid values.
    #[error("invalid message: {0}")]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
/// One question of a quiz uploaded by the host.
pub struct QuizItem {
    /// Prompt shown to every client.
    pub question: String,
    /// Expected answer, only ever sent to hosts.
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
/// Messages accepted from WebSocket clients.
///
/// Player identity is always taken from the session, never from message fields.
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Log in as the host or a player.
    Auth {
        /// Player or host name.
        name: String,
        /// Credential.
        password: String,
    },
    /// Same as [`ClientMessage::Auth`].
    Login {
        /// Player or host name.
        name: String,
        /// Credential.
        password: String,
    },
    /// Claim the right to answer first.
    Buzz,
    /// Finalize an answer for the current question.
    SubmitAnswer {
        /// Answer text.
        answer: String,
    },
    /// In-progress answer text for the host's live preview.
    LiveUpdate {
        /// Current text.
        text: String,
    },
    /// Move to the next question.
    NextQuestion,
    /// Move to the previous question.
    PrevQuestion,
    /// Close an open buzzer, open a closed one.
    ToggleBuzzer,
    /// Open the buzzer and clear the round.
    OpenBuzzer,
    /// Close the buzzer without a buzz.
    CloseBuzzer,
    /// Same as [`ClientMessage::OpenBuzzer`].
    Reset,
    /// Adjudicate the buzzed-in answer.
    UpdatePoints {
        /// Award for a correct answer; the configured default applies when absent.
        #[serde(default)]
        points: Option<i64>,
        /// Whether the answer was correct.
        #[serde(rename = "isCorrect")]
        is_correct: bool,
    },
    /// Set a player's score to an absolute value.
    ManualScoreChange {
        /// Player name.
        name: String,
        /// New total score.
        #[serde(rename = "newScore")]
        new_score: i64,
    },
    /// Zero the round tally, leaving persisted counters alone.
    ResetRoundPoints,
    /// Zero every player's counters.
    ResetAllPlayerStats,
    /// Same as [`ClientMessage::ResetAllPlayerStats`].
    ResetAllStats,
    /// Request the per-player statistics.
    GetStats,
    /// Replace the quiz.
    LoadQuiz {
        /// New questions in order.
        quiz: Vec<QuizItem>,
    },
    /// Any message type this server does not know.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse and validate a text frame.
    pub fn from_json_str(text: &str) -> Result<Self, MessageError> {
        let message: Self = serde_json::from_str(text)?;
        message.validate()?;
        Ok(message)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            ClientMessage::SubmitAnswer { answer: text } | ClientMessage::LiveUpdate { text } => {
                validate_answer_text(text)
            }
            ClientMessage::LoadQuiz { quiz } => quiz
                .iter()
                .try_for_each(|item| validate_question_prompt(&item.question)),
            ClientMessage::UpdatePoints {
                points: Some(points),
                ..
            } => validate_score(*points),
            ClientMessage::ManualScoreChange { new_score, .. } => validate_score(*new_score),
            _ => Ok(()),
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Auth { .. } => "auth",
            ClientMessage::Login { .. } => "login",
            ClientMessage::Buzz => "buzz",
            ClientMessage::SubmitAnswer { .. } => "submitAnswer",
            ClientMessage::LiveUpdate { .. } => "liveUpdate",
            ClientMessage::NextQuestion => "nextQuestion",
            ClientMessage::PrevQuestion => "prevQuestion",
            ClientMessage::ToggleBuzzer => "toggleBuzzer",
            ClientMessage::OpenBuzzer => "openBuzzer",
            ClientMessage::CloseBuzzer => "closeBuzzer",
            ClientMessage::Reset => "reset",
            ClientMessage::UpdatePoints { .. } => "updatePoints",
            ClientMessage::ManualScoreChange { .. } => "manualScoreChange",
            ClientMessage::ResetRoundPoints => "resetRoundPoints",
            ClientMessage::ResetAllPlayerStats => "resetAllPlayerStats",
            ClientMessage::ResetAllStats => "resetAllStats",
            ClientMessage::GetStats => "getStats",
            ClientMessage::LoadQuiz { .. } => "loadQuiz",
            ClientMessage::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
/// Wire representation of the buzzer phase.
#[serde(rename_all = "lowercase")]
pub enum BuzzerStatus {
    /// Accepting a buzz.
    Open,
    /// Not accepting buzzes.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
/// Per-player counters sent to hosts.
#[serde(rename_all = "camelCase")]
pub struct PlayerStatsEntry {
    /// Cumulative score.
    pub total_score: i64,
    /// Answers adjudicated correct.
    pub correct_answers: u32,
    /// Answers adjudicated incorrect.
    pub incorrect_answers: u32,
    /// Questions answered.
    pub total_questions_answered: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
/// Finalized answer with its auto-grading hint.
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswerEntry {
    /// Answer text.
    pub answer: String,
    /// Whether it matches the expected answer after trimming and case folding.
    pub matches_expected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
/// Messages pushed to WebSocket clients.
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Outcome of an `auth`/`login` request.
    AuthResponse {
        /// Whether the credentials were accepted.
        success: bool,
        /// Authenticated name.
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        /// Whether the session is the host.
        #[serde(rename = "isHost")]
        is_host: bool,
    },
    /// Buzzer state sent right after connecting.
    InitialStatus {
        /// Buzzer phase.
        status: BuzzerStatus,
        /// Player holding the buzz.
        #[serde(rename = "buzzedIn")]
        buzzed_in: Option<String>,
    },
    /// Scores of the connected players, highest first.
    UpdateScores {
        /// Player name to total score.
        #[schema(value_type = Object)]
        scores: IndexMap<String, i64>,
        /// Names of connected players.
        #[serde(rename = "activePlayers")]
        active_players: Vec<String>,
        /// Points each connected player earned since the round tally was last cleared.
        #[serde(rename = "roundScores")]
        #[schema(value_type = Object)]
        round_scores: IndexMap<String, i64>,
    },
    /// Counters of every known player, highest score first.
    UpdateStats {
        /// Player name to counters.
        #[schema(value_type = Object)]
        stats: IndexMap<String, PlayerStatsEntry>,
    },
    /// Buzzer state after a change.
    BuzzerStatusUpdate {
        /// Buzzer phase.
        status: BuzzerStatus,
        /// Player holding the buzz.
        #[serde(rename = "buzzedIn")]
        buzzed_in: Option<String>,
    },
    /// Someone won the buzz race.
    BuzzedIn {
        /// Winner.
        name: String,
    },
    /// Current question without its answer.
    QuestionUpdate {
        /// Cursor into the quiz.
        #[serde(rename = "questionIndex")]
        question_index: usize,
        /// Number of loaded questions.
        #[serde(rename = "questionCount")]
        question_count: usize,
        /// Prompt, absent when no quiz is loaded.
        #[serde(rename = "currentQuestionText")]
        current_question_text: Option<String>,
    },
    /// Current question including the expected answer, for hosts only.
    HostQuestionUpdate {
        /// Cursor into the quiz.
        #[serde(rename = "questionIndex")]
        question_index: usize,
        /// Number of loaded questions.
        #[serde(rename = "questionCount")]
        question_count: usize,
        /// Prompt, absent when no quiz is loaded.
        #[serde(rename = "currentQuestionText")]
        current_question_text: Option<String>,
        /// Expected answer, absent when no quiz is loaded.
        #[serde(rename = "correctAnswer")]
        correct_answer: Option<String>,
    },
    /// A new quiz replaced the previous one.
    QuizLoaded {
        /// Number of questions in the new quiz.
        #[serde(rename = "questionCount")]
        question_count: usize,
    },
    /// In-progress answers of the round.
    LiveAnswers {
        /// Player name to current text.
        #[serde(rename = "liveAnswers")]
        #[schema(value_type = Object)]
        live_answers: IndexMap<String, String>,
    },
    /// Finalized answers of the round.
    SubmittedAnswers {
        /// Player name to answer.
        #[serde(rename = "submittedAnswers")]
        #[schema(value_type = Object)]
        submitted_answers: IndexMap<String, SubmittedAnswerEntry>,
    },
    /// The buzzed-in answer was judged correct.
    CorrectAnswer {
        /// Player who answered.
        name: String,
        /// Points awarded.
        points: i64,
    },
    /// The buzzed-in answer was judged wrong.
    WrongAnswer {
        /// Player who answered.
        name: String,
    },
    /// Generic failure acknowledgment for the initiating client.
    Error {
        /// Human readable summary.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_aliases_and_unit_messages() {
        let auth = ClientMessage::from_json_str(r#"{"type":"login","name":"a","password":"p"}"#)
            .unwrap();
        assert_eq!(
            auth,
            ClientMessage::Login {
                name: "a".into(),
                password: "p".into()
            }
        );
        assert_eq!(
            ClientMessage::from_json_str(r#"{"type":"resetAllStats"}"#).unwrap(),
            ClientMessage::ResetAllStats
        );
        assert_eq!(
            ClientMessage::from_json_str(r#"{"type":"resetRoundPoints"}"#).unwrap(),
            ClientMessage::ResetRoundPoints
        );
        assert_eq!(
            ClientMessage::from_json_str(r#"{"type":"buzz","name":"ignored"}"#).unwrap(),
            ClientMessage::Buzz
        );
    }

    #[test]
    fn update_points_requires_explicit_correctness() {
        assert_eq!(
            ClientMessage::from_json_str(r#"{"type":"updatePoints","isCorrect":true}"#).unwrap(),
            ClientMessage::UpdatePoints {
                points: None,
                is_correct: true
            }
        );
        assert!(ClientMessage::from_json_str(r#"{"type":"updatePoints","points":5}"#).is_err());
    }

    #[test]
    fn unknown_types_parse_and_garbage_fails() {
        assert_eq!(
            ClientMessage::from_json_str(r#"{"type":"dance"}"#).unwrap(),
            ClientMessage::Unknown
        );
        assert!(matches!(
            ClientMessage::from_json_str("not json"),
            Err(MessageError::Json(_))
        ));
        assert!(ClientMessage::from_json_str(r#"{"name":"a"}"#).is_err());
    }

    #[test]
    fn validation_rejects_blank_questions() {
        let err = ClientMessage::from_json_str(
            r#"{"type":"loadQuiz","quiz":[{"question":" ","answer":"x"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, MessageError::Validation(_)));
    }

    #[test]
    fn validation_rejects_extreme_scores() {
        let err = ClientMessage::from_json_str(
            r#"{"type":"manualScoreChange","name":"a","newScore":-9223372036854775808}"#,
        )
        .unwrap_err();
        assert!(matches!(err, MessageError::Validation(_)));
        assert!(
            ClientMessage::from_json_str(
                r#"{"type":"updatePoints","points":9223372036854775807,"isCorrect":true}"#
            )
            .is_err()
        );
        assert!(
            ClientMessage::from_json_str(r#"{"type":"manualScoreChange","name":"a","newScore":-40}"#)
                .is_ok()
        );
    }

    #[test]
    fn server_messages_use_camel_case_tags() {
        let value = serde_json::to_value(ServerMessage::BuzzerStatusUpdate {
            status: BuzzerStatus::Closed,
            buzzed_in: Some("alice".into()),
        })
        .unwrap();
        assert_eq!(
            value,
            json!({"type": "buzzerStatusUpdate", "status": "closed", "buzzedIn": "alice"})
        );

        let value = serde_json::to_value(ServerMessage::AuthResponse {
            success: false,
            name: None,
            is_host: false,
        })
        .unwrap();
        assert_eq!(
            value,
            json!({"type": "authResponse", "success": false, "isHost": false})
        );
    }

    #[test]
    fn scores_keep_insertion_order() {
        let mut scores = IndexMap::new();
        scores.insert("zed".to_string(), 9);
        scores.insert("amy".to_string(), 3);
        let text = serde_json::to_string(&ServerMessage::UpdateScores {
            scores,
            active_players: vec!["amy".into(), "zed".into()],
            round_scores: IndexMap::new(),
        })
        .unwrap();
        assert!(text.find("zed").unwrap() < text.find("amy").unwrap());
    }
}

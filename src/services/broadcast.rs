//! Broadcast dispatcher: snapshot builders and audience fan-out.

use axum::extract::ws::Message;
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::{
    dto::ws::{BuzzerStatus, PlayerStatsEntry, ServerMessage, SubmittedAnswerEntry},
    state::{
        buzzer::BuzzerPhase,
        game::QuizSession,
        ledger::PlayerRecord,
        session::{Audience, SessionId, SessionRegistry},
    },
};

/// A message addressed to a subset of the connected clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    /// Who receives the message.
    pub audience: Audience,
    /// What is sent.
    pub message: ServerMessage,
}

impl Outbound {
    /// Address a message to every connected client.
    pub fn all(message: ServerMessage) -> Self {
        Self {
            audience: Audience::All,
            message,
        }
    }

    /// Address a message to hosts only.
    pub fn hosts(message: ServerMessage) -> Self {
        Self {
            audience: Audience::Hosts,
            message,
        }
    }

    /// Address a message to a single session.
    pub fn to(id: SessionId, message: ServerMessage) -> Self {
        Self {
            audience: Audience::Session(id),
            message,
        }
    }
}

/// Serialize each message once and queue it on every matching writer, in order.
pub fn deliver(sessions: &SessionRegistry, outbound: Vec<Outbound>) {
    for Outbound { audience, message } in outbound {
        let payload = match serde_json::to_string(&message) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "failed to serialize message `{message:?}`");
                continue;
            }
        };
        let frame = Message::Text(payload.into());
        for tx in sessions.recipients(audience) {
            if tx.send(frame.clone()).is_err() {
                debug!(?audience, "writer closed; dropping message");
            }
        }
    }
}

impl From<&BuzzerPhase> for BuzzerStatus {
    fn from(phase: &BuzzerPhase) -> Self {
        if phase.is_open() {
            BuzzerStatus::Open
        } else {
            BuzzerStatus::Closed
        }
    }
}

/// `initialStatus` for a freshly connected client.
pub fn initial_status(quiz: &QuizSession) -> ServerMessage {
    ServerMessage::InitialStatus {
        status: quiz.phase().into(),
        buzzed_in: quiz.phase().buzzed_in().map(str::to_owned),
    }
}

/// `buzzerStatusUpdate` reflecting the current phase.
pub fn buzzer_status(quiz: &QuizSession) -> ServerMessage {
    ServerMessage::BuzzerStatusUpdate {
        status: quiz.phase().into(),
        buzzed_in: quiz.phase().buzzed_in().map(str::to_owned),
    }
}

/// `updateScores` for the connected players, highest score first.
pub fn scores(quiz: &QuizSession, sessions: &SessionRegistry) -> ServerMessage {
    let active_players = sessions.active_players();
    let mut ranked: Vec<(String, i64)> = active_players
        .iter()
        .map(|name| {
            let score = quiz
                .ledger()
                .get(name)
                .map(|record| record.stats.total_score)
                .unwrap_or_default();
            (name.clone(), score)
        })
        .collect();
    ranked.sort_by(|(a_name, a_score), (b_name, b_score)| {
        b_score.cmp(a_score).then_with(|| a_name.cmp(b_name))
    });

    let round_scores = active_players
        .iter()
        .map(|name| (name.clone(), quiz.round_points(name)))
        .collect();

    ServerMessage::UpdateScores {
        scores: ranked.into_iter().collect(),
        active_players,
        round_scores,
    }
}

/// Every known player, highest score first.
pub fn ranked_players(quiz: &QuizSession) -> Vec<&PlayerRecord> {
    let mut players: Vec<&PlayerRecord> = quiz.ledger().iter().collect();
    players.sort_by(|a, b| {
        b.stats
            .total_score
            .cmp(&a.stats.total_score)
            .then_with(|| a.name.cmp(&b.name))
    });
    players
}

/// `updateStats` with the counters of every known player.
pub fn stats(quiz: &QuizSession) -> ServerMessage {
    let stats: IndexMap<String, PlayerStatsEntry> = ranked_players(quiz)
        .into_iter()
        .map(|record| {
            (
                record.name.clone(),
                PlayerStatsEntry {
                    total_score: record.stats.total_score,
                    correct_answers: record.stats.correct_answers,
                    incorrect_answers: record.stats.incorrect_answers,
                    total_questions_answered: record.stats.total_questions_answered,
                },
            )
        })
        .collect();
    ServerMessage::UpdateStats { stats }
}

/// `questionUpdate`: the prompt only.
pub fn question_update(quiz: &QuizSession) -> ServerMessage {
    ServerMessage::QuestionUpdate {
        question_index: quiz.current_question_index(),
        question_count: quiz.questions().len(),
        current_question_text: quiz.current_question().map(|q| q.prompt.clone()),
    }
}

/// `hostQuestionUpdate`: the prompt and its expected answer.
pub fn host_question_update(quiz: &QuizSession) -> ServerMessage {
    let question = quiz.current_question();
    ServerMessage::HostQuestionUpdate {
        question_index: quiz.current_question_index(),
        question_count: quiz.questions().len(),
        current_question_text: question.map(|q| q.prompt.clone()),
        correct_answer: question.map(|q| q.expected_answer.clone()),
    }
}

/// `liveAnswers` of the current round.
pub fn live_answers(quiz: &QuizSession) -> ServerMessage {
    ServerMessage::LiveAnswers {
        live_answers: quiz.live_answers().clone(),
    }
}

/// `submittedAnswers` of the current round.
pub fn submitted_answers(quiz: &QuizSession) -> ServerMessage {
    ServerMessage::SubmittedAnswers {
        submitted_answers: quiz
            .submitted_answers()
            .iter()
            .map(|(name, submitted)| {
                (
                    name.clone(),
                    SubmittedAnswerEntry {
                        answer: submitted.answer.clone(),
                        matches_expected: submitted.matches_expected,
                    },
                )
            })
            .collect(),
    }
}

/// Current question for everyone, with the answer for hosts.
pub fn question_broadcast(quiz: &QuizSession) -> Vec<Outbound> {
    vec![
        Outbound::all(question_update(quiz)),
        Outbound::hosts(host_question_update(quiz)),
    ]
}

/// Both answer maps, sent to hosts after they changed wholesale.
pub fn answers_for_hosts(quiz: &QuizSession) -> Vec<Outbound> {
    vec![
        Outbound::hosts(live_answers(quiz)),
        Outbound::hosts(submitted_answers(quiz)),
    ]
}

/// Scores for everyone and stats for hosts.
pub fn scoreboard_refresh(quiz: &QuizSession, sessions: &SessionRegistry) -> Vec<Outbound> {
    vec![
        Outbound::all(scores(quiz, sessions)),
        Outbound::hosts(stats(quiz)),
    ]
}

/// Snapshot sent to a client right after it connects.
pub fn connect_snapshot(
    quiz: &QuizSession,
    sessions: &SessionRegistry,
    id: SessionId,
) -> Vec<Outbound> {
    vec![
        Outbound::to(id, initial_status(quiz)),
        Outbound::to(id, question_update(quiz)),
        Outbound::to(id, scores(quiz, sessions)),
    ]
}

/// Role-appropriate snapshot sent to a client right after it logs in.
pub fn login_snapshot(quiz: &QuizSession, id: SessionId, is_host: bool) -> Vec<Outbound> {
    let mut outbound = vec![Outbound::to(id, buzzer_status(quiz))];
    if is_host {
        outbound.push(Outbound::to(id, host_question_update(quiz)));
        outbound.push(Outbound::to(id, stats(quiz)));
        outbound.push(Outbound::to(id, live_answers(quiz)));
        outbound.push(Outbound::to(id, submitted_answers(quiz)));
    } else {
        outbound.push(Outbound::to(id, question_update(quiz)));
    }
    outbound
}

//! Serialized message handling for every connected client.
//!
//! Each entry point takes the quiz lock for the whole request, storage awaits and outbound
//! delivery included, so requests are applied one at a time in arrival order.

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    dao::models::QuestionEntity,
    dto::ws::{ClientMessage, QuizItem, ServerMessage},
    error::ServiceError,
    services::{
        auth_service::{self, AuthOutcome},
        broadcast::{self, Outbound, deliver},
        scoring_service,
    },
    state::{
        AppState,
        buzzer::BuzzerEvent,
        game::{Question, QuizSession},
        session::{SessionId, SessionRole},
        transitions::run_transition,
    },
};

/// Generic failure acknowledgment sent when a request hit a storage problem.
const STORAGE_FAILURE_MESSAGE: &str = "request could not be completed, please try again";

/// Register a new connection and send it the connect snapshot.
pub async fn client_connected(state: &AppState, tx: mpsc::UnboundedSender<Message>) -> SessionId {
    let quiz = state.quiz().lock().await;
    let id = state.sessions().register(tx);
    info!(session = %id, "client connected");
    deliver(
        state.sessions(),
        broadcast::connect_snapshot(&quiz, state.sessions(), id),
    );
    id
}

/// Forget a connection and refresh scores when it was a player.
pub async fn client_disconnected(state: &AppState, id: SessionId) {
    let quiz = state.quiz().lock().await;
    let Some(connection) = state.sessions().remove(id) else {
        return;
    };
    info!(session = %id, role = ?connection.role, "client disconnected");
    if matches!(connection.role, SessionRole::Player(_)) {
        deliver(
            state.sessions(),
            vec![Outbound::all(broadcast::scores(&quiz, state.sessions()))],
        );
    }
}

/// Handle one inbound message and deliver the resulting broadcasts.
pub async fn process_message(state: &AppState, id: SessionId, message: ClientMessage) {
    let mut quiz = state.quiz().lock().await;
    let outbound = handle_message(state, &mut quiz, id, message).await;
    deliver(state.sessions(), outbound);
}

/// Push scores, stats and the current question to everyone, e.g. after storage came back.
pub async fn refresh_all(state: &AppState) {
    let quiz = state.quiz().lock().await;
    let mut outbound = broadcast::scoreboard_refresh(&quiz, state.sessions());
    outbound.extend(broadcast::question_broadcast(&quiz));
    deliver(state.sessions(), outbound);
}

/// Apply one message to the quiz and return what must be sent to whom.
///
/// Requests that are not allowed for the session's role or the current buzzer phase are dropped
/// without a reply. Storage failures leave the quiz untouched and answer the sender with a
/// generic `error` message.
pub async fn handle_message(
    state: &AppState,
    quiz: &mut QuizSession,
    id: SessionId,
    message: ClientMessage,
) -> Vec<Outbound> {
    let Some(role) = state.sessions().role(id) else {
        return Vec::new();
    };
    let kind = message.kind();

    match dispatch(state, quiz, id, role, message).await {
        Ok(outbound) => outbound,
        Err(err) if err.is_storage_failure() => {
            warn!(session = %id, message = kind, error = %err, "request failed on storage");
            vec![Outbound::to(
                id,
                ServerMessage::Error {
                    message: STORAGE_FAILURE_MESSAGE.into(),
                },
            )]
        }
        Err(err) => {
            debug!(session = %id, message = kind, error = %err, "request dropped");
            Vec::new()
        }
    }
}

async fn dispatch(
    state: &AppState,
    quiz: &mut QuizSession,
    id: SessionId,
    role: SessionRole,
    message: ClientMessage,
) -> Result<Vec<Outbound>, ServiceError> {
    match message {
        ClientMessage::Auth { name, password } | ClientMessage::Login { name, password } => {
            login(state, quiz, id, role, &name, &password).await
        }
        ClientMessage::Unknown => Err(ServiceError::InvalidInput("unknown message type".into())),
        message => match role {
            SessionRole::Unauthenticated => {
                Err(ServiceError::Unauthorized("login required".into()))
            }
            SessionRole::Player(name) => player_request(quiz, name, message).await,
            SessionRole::Host => host_request(state, quiz, id, message).await,
        },
    }
}

async fn player_request(
    quiz: &mut QuizSession,
    name: String,
    message: ClientMessage,
) -> Result<Vec<Outbound>, ServiceError> {
    match message {
        ClientMessage::Buzz => buzz(quiz, name).await,
        ClientMessage::SubmitAnswer { answer } => {
            quiz.record_submission(&name, answer);
            Ok(vec![Outbound::hosts(broadcast::submitted_answers(quiz))])
        }
        ClientMessage::LiveUpdate { text } => {
            quiz.record_live(&name, text);
            Ok(vec![Outbound::hosts(broadcast::live_answers(quiz))])
        }
        other => Err(ServiceError::Unauthorized(format!(
            "`{}` is reserved to the host",
            other.kind()
        ))),
    }
}

async fn host_request(
    state: &AppState,
    quiz: &mut QuizSession,
    id: SessionId,
    message: ClientMessage,
) -> Result<Vec<Outbound>, ServiceError> {
    match message {
        ClientMessage::Buzz => {
            let name = state.config().host().name.clone();
            buzz(quiz, name).await
        }
        ClientMessage::NextQuestion => change_question(quiz, true).await,
        ClientMessage::PrevQuestion => change_question(quiz, false).await,
        ClientMessage::ToggleBuzzer => {
            let event = if quiz.phase().is_open() {
                BuzzerEvent::Close
            } else {
                BuzzerEvent::Reset
            };
            set_buzzer(quiz, event).await
        }
        ClientMessage::OpenBuzzer | ClientMessage::Reset => {
            set_buzzer(quiz, BuzzerEvent::Reset).await
        }
        ClientMessage::CloseBuzzer => set_buzzer(quiz, BuzzerEvent::Close).await,
        ClientMessage::UpdatePoints { points, is_correct } => {
            let outcome = scoring_service::adjudicate(state, quiz, is_correct, points).await?;
            let verdict = if outcome.correct {
                ServerMessage::CorrectAnswer {
                    name: outcome.name,
                    points: outcome.awarded,
                }
            } else {
                ServerMessage::WrongAnswer { name: outcome.name }
            };
            let mut outbound = vec![Outbound::all(verdict)];
            outbound.extend(broadcast::scoreboard_refresh(quiz, state.sessions()));
            outbound.push(Outbound::all(broadcast::buzzer_status(quiz)));
            outbound.extend(broadcast::answers_for_hosts(quiz));
            Ok(outbound)
        }
        ClientMessage::ManualScoreChange { name, new_score } => {
            scoring_service::manual_score_change(state, quiz, &name, new_score).await?;
            Ok(broadcast::scoreboard_refresh(quiz, state.sessions()))
        }
        ClientMessage::ResetRoundPoints => {
            scoring_service::reset_round_points(quiz);
            Ok(broadcast::scoreboard_refresh(quiz, state.sessions()))
        }
        ClientMessage::ResetAllPlayerStats | ClientMessage::ResetAllStats => {
            scoring_service::reset_all_stats(state, quiz).await?;
            Ok(broadcast::scoreboard_refresh(quiz, state.sessions()))
        }
        ClientMessage::GetStats => Ok(vec![Outbound::to(id, broadcast::stats(quiz))]),
        ClientMessage::LoadQuiz { quiz: items } => load_quiz(state, quiz, items).await,
        other => Err(ServiceError::Unauthorized(format!(
            "`{}` is reserved to players",
            other.kind()
        ))),
    }
}

async fn login(
    state: &AppState,
    quiz: &mut QuizSession,
    id: SessionId,
    role: SessionRole,
    name: &str,
    password: &str,
) -> Result<Vec<Outbound>, ServiceError> {
    if role != SessionRole::Unauthenticated {
        return Err(ServiceError::InvalidState(
            "session is already authenticated".into(),
        ));
    }

    let sessions = state.sessions();
    let outcome = auth_service::authenticate(state, quiz, name, password).await?;
    let is_host = match outcome {
        AuthOutcome::Rejected => {
            info!(session = %id, "login rejected");
            return Ok(vec![Outbound::to(
                id,
                ServerMessage::AuthResponse {
                    success: false,
                    name: None,
                    is_host: false,
                },
            )]);
        }
        AuthOutcome::Host => {
            sessions.set_role(id, SessionRole::Host);
            info!(session = %id, "host logged in");
            true
        }
        AuthOutcome::Player(player) => {
            for previous in sessions.sessions_for_player(&player) {
                sessions.set_role(previous, SessionRole::Unauthenticated);
                sessions.close(previous);
                info!(session = %previous, player = %player, "detached earlier session");
            }
            sessions.set_role(id, SessionRole::Player(player.clone()));
            quiz.join_roster(&player);
            info!(session = %id, player = %player, "player logged in");
            false
        }
    };

    let mut outbound = vec![Outbound::to(
        id,
        ServerMessage::AuthResponse {
            success: true,
            name: Some(name.to_owned()),
            is_host,
        },
    )];
    outbound.extend(broadcast::login_snapshot(quiz, id, is_host));
    outbound.extend(broadcast::scoreboard_refresh(quiz, sessions));
    Ok(outbound)
}

async fn buzz(quiz: &mut QuizSession, name: String) -> Result<Vec<Outbound>, ServiceError> {
    run_transition(
        quiz,
        BuzzerEvent::Buzz { name: name.clone() },
        None,
        async { Ok::<_, ServiceError>(()) },
    )
    .await?;
    info!(player = %name, "buzzed in");
    Ok(vec![
        Outbound::all(ServerMessage::BuzzedIn { name }),
        Outbound::all(broadcast::buzzer_status(quiz)),
    ])
}

async fn set_buzzer(
    quiz: &mut QuizSession,
    event: BuzzerEvent,
) -> Result<Vec<Outbound>, ServiceError> {
    let ((), plan) = run_transition(quiz, event, None, async { Ok::<_, ServiceError>(()) }).await?;
    info!(event = ?plan.event, from = ?plan.from, to = ?plan.to, "buzzer changed by host");

    let mut outbound = vec![Outbound::all(broadcast::buzzer_status(quiz))];
    if plan.clears_answers() {
        outbound.extend(broadcast::answers_for_hosts(quiz));
    }
    Ok(outbound)
}

async fn change_question(
    quiz: &mut QuizSession,
    forward: bool,
) -> Result<Vec<Outbound>, ServiceError> {
    let target = if forward {
        quiz.next_index()
    } else {
        quiz.prev_index()
    };
    run_transition(
        quiz,
        BuzzerEvent::QuestionChanged,
        None,
        async { Ok::<_, ServiceError>(()) },
    )
    .await?;
    quiz.set_question_index(target);
    info!(index = target, "question changed");

    let mut outbound = vec![Outbound::all(broadcast::buzzer_status(quiz))];
    outbound.extend(broadcast::question_broadcast(quiz));
    outbound.extend(broadcast::answers_for_hosts(quiz));
    Ok(outbound)
}

async fn load_quiz(
    state: &AppState,
    quiz: &mut QuizSession,
    items: Vec<QuizItem>,
) -> Result<Vec<Outbound>, ServiceError> {
    let questions: Vec<Question> = items
        .into_iter()
        .map(|item| Question {
            prompt: item.question,
            expected_answer: item.answer,
        })
        .collect();
    let entities: Vec<QuestionEntity> = questions.iter().cloned().map(Into::into).collect();

    let persist = async {
        let store = state.require_store().await?;
        store.replace_questions(entities).await?;
        Ok::<_, ServiceError>(())
    };
    run_transition(
        quiz,
        BuzzerEvent::QuizLoaded,
        state.transition_timeout(),
        persist,
    )
    .await?;
    quiz.replace_questions(questions);
    info!(questions = quiz.questions().len(), "quiz loaded");

    let mut outbound = vec![
        Outbound::all(ServerMessage::QuizLoaded {
            question_count: quiz.questions().len(),
        }),
        Outbound::all(broadcast::buzzer_status(quiz)),
    ];
    outbound.extend(broadcast::question_broadcast(quiz));
    outbound.extend(broadcast::answers_for_hosts(quiz));
    Ok(outbound)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{Value, json};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::PlayerEntity,
            store::{PlayerStore, QuestionStore, memory::MemoryStore},
        },
        state::SharedState,
    };

    struct Client {
        id: SessionId,
        rx: mpsc::UnboundedReceiver<Message>,
        closed: bool,
    }

    impl Client {
        /// Messages received since the last drain.
        fn drain(&mut self) -> Vec<Value> {
            let mut messages = Vec::new();
            while let Ok(frame) = self.rx.try_recv() {
                match frame {
                    Message::Text(text) => {
                        messages.push(serde_json::from_str(text.as_str()).unwrap())
                    }
                    Message::Close(_) => self.closed = true,
                    _ => {}
                }
            }
            messages
        }
    }

    fn of_type<'a>(messages: &'a [Value], kind: &str) -> Vec<&'a Value> {
        messages.iter().filter(|m| m["type"] == kind).collect()
    }

    fn player(name: &str) -> PlayerEntity {
        PlayerEntity {
            name: name.into(),
            password: "pw".into(),
            total_score: 0,
            correct_answers: 0,
            incorrect_answers: 0,
            total_questions_answered: 0,
        }
    }

    fn question(prompt: &str, answer: &str) -> QuestionEntity {
        QuestionEntity {
            question: prompt.into(),
            answer: answer.into(),
        }
    }

    async fn setup(players: &[&str]) -> (SharedState, MemoryStore) {
        let store = MemoryStore::seeded(
            players.iter().map(|name| player(name)).collect(),
            vec![question("q0", "Paris"), question("q1", "42")],
        );
        let state = AppState::new(AppConfig::default());
        state.install_store(Arc::new(store.clone())).await.unwrap();
        (state, store)
    }

    async fn connect(state: &AppState) -> Client {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = client_connected(state, tx).await;
        Client {
            id,
            rx,
            closed: false,
        }
    }

    async fn send(state: &AppState, client: &Client, message: Value) {
        let message: ClientMessage = serde_json::from_value(message).unwrap();
        process_message(state, client.id, message).await;
    }

    async fn login(state: &AppState, name: &str, password: &str) -> Client {
        let mut client = connect(state).await;
        send(
            state,
            &client,
            json!({"type": "auth", "name": name, "password": password}),
        )
        .await;
        client.drain();
        client
    }

    async fn score(state: &AppState, name: &str) -> i64 {
        state
            .quiz()
            .lock()
            .await
            .ledger()
            .get(name)
            .unwrap()
            .stats
            .total_score
    }

    /// Host plus players A, B and C logged in, buzzer opened.
    async fn round(state: &SharedState) -> (Client, Vec<Client>) {
        let mut host = login(state, "host", "host").await;
        let mut players = Vec::new();
        for name in ["A", "B", "C"] {
            players.push(login(state, name, "pw").await);
        }
        send(state, &host, json!({"type": "openBuzzer"})).await;
        host.drain();
        for client in players.iter_mut() {
            client.drain();
        }
        (host, players)
    }

    #[tokio::test]
    async fn connect_sends_status_question_and_scores() {
        let (state, _store) = setup(&[]).await;
        let mut client = connect(&state).await;
        let messages = client.drain();
        let kinds: Vec<_> = messages.iter().map(|m| m["type"].clone()).collect();
        assert_eq!(
            kinds,
            vec![json!("initialStatus"), json!("questionUpdate"), json!("updateScores")]
        );
        assert_eq!(messages[0]["status"], "closed");
        assert_eq!(messages[1]["currentQuestionText"], "q0");
        assert!(messages[1].get("correctAnswer").is_none());
    }

    #[tokio::test]
    async fn login_sends_role_snapshot_and_refreshes_scores() {
        let (state, _store) = setup(&["A"]).await;
        let mut watcher = connect(&state).await;
        watcher.drain();

        let mut host = connect(&state).await;
        host.drain();
        send(&state, &host, json!({"type": "login", "name": "host", "password": "host"})).await;
        let messages = host.drain();
        assert_eq!(messages[0], json!({"type": "authResponse", "success": true, "name": "host", "isHost": true}));
        assert_eq!(of_type(&messages, "hostQuestionUpdate")[0]["correctAnswer"], "Paris");
        assert_eq!(of_type(&messages, "updateStats").len(), 2);

        let mut player = connect(&state).await;
        player.drain();
        send(&state, &player, json!({"type": "auth", "name": "A", "password": "pw"})).await;
        let messages = player.drain();
        assert_eq!(messages[0]["isHost"], false);
        assert!(of_type(&messages, "hostQuestionUpdate").is_empty());
        assert!(of_type(&messages, "updateStats").is_empty());

        let watched = watcher.drain();
        let last_scores = of_type(&watched, "updateScores").pop().unwrap().clone();
        assert_eq!(last_scores["activePlayers"], json!(["A"]));
        assert_eq!(last_scores["scores"], json!({"A": 0}));
    }

    #[tokio::test]
    async fn bad_credentials_are_answered_and_retry_is_possible() {
        let (state, _store) = setup(&["A"]).await;
        let mut client = connect(&state).await;
        client.drain();

        send(&state, &client, json!({"type": "auth", "name": "A", "password": "nope"})).await;
        assert_eq!(
            client.drain(),
            vec![json!({"type": "authResponse", "success": false, "isHost": false})]
        );
        assert_eq!(
            state.sessions().role(client.id),
            Some(SessionRole::Unauthenticated)
        );

        send(&state, &client, json!({"type": "auth", "name": "A", "password": "pw"})).await;
        assert_eq!(client.drain()[0]["success"], true);
        assert_eq!(
            state.sessions().role(client.id),
            Some(SessionRole::Player("A".into()))
        );
    }

    #[tokio::test]
    async fn reauthentication_is_ignored() {
        let (state, _store) = setup(&["A"]).await;
        let mut client = login(&state, "A", "pw").await;
        send(&state, &client, json!({"type": "auth", "name": "host", "password": "host"})).await;
        assert!(client.drain().is_empty());
        assert_eq!(
            state.sessions().role(client.id),
            Some(SessionRole::Player("A".into()))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_buzzes_have_exactly_one_winner() {
        let (state, _store) = setup(&[]).await;
        let mut host = login(&state, "host", "host").await;
        let mut players = Vec::new();
        for i in 0..8 {
            players.push(login(&state, &format!("p{i}"), "pw").await);
        }
        send(&state, &host, json!({"type": "openBuzzer"})).await;
        host.drain();

        let handles: Vec<_> = players
            .iter()
            .map(|client| {
                let state = state.clone();
                let id = client.id;
                tokio::spawn(async move {
                    process_message(&state, id, ClientMessage::Buzz).await;
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let winner = state
            .quiz()
            .lock()
            .await
            .phase()
            .buzzed_in()
            .map(str::to_owned)
            .unwrap();
        let buzzed = host.drain();
        let notices = of_type(&buzzed, "buzzedIn");
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0]["name"], winner.as_str());
        for client in players.iter_mut() {
            assert_eq!(of_type(&client.drain(), "buzzedIn").len(), 1);
        }
    }

    #[tokio::test]
    async fn buzz_while_closed_is_a_silent_no_op() {
        let (state, _store) = setup(&[]).await;
        let (mut host, mut players) = round(&state).await;

        send(&state, &players[0], json!({"type": "buzz"})).await;
        host.drain();
        send(&state, &players[1], json!({"type": "buzz"})).await;

        assert!(host.drain().is_empty());
        assert!(players[1].drain().iter().all(|m| m["type"] != "buzzedIn" || m["name"] == "A"));
        assert_eq!(
            state.quiz().lock().await.phase().buzzed_in(),
            Some("A")
        );
    }

    #[tokio::test]
    async fn reset_twice_matches_reset_once() {
        let (state, _store) = setup(&[]).await;
        let (mut host, players) = round(&state).await;
        send(&state, &players[0], json!({"type": "submitAnswer", "answer": "paris"})).await;
        send(&state, &players[1], json!({"type": "buzz"})).await;

        send(&state, &host, json!({"type": "reset"})).await;
        host.drain();
        send(&state, &host, json!({"type": "reset"})).await;
        let messages = host.drain();

        let quiz = state.quiz().lock().await;
        assert!(quiz.phase().is_open());
        assert_eq!(quiz.phase().buzzed_in(), None);
        assert!(quiz.submitted_answers().is_empty());
        assert!(quiz.live_answers().is_empty());
        assert_eq!(
            of_type(&messages, "buzzerStatusUpdate")[0],
            &json!({"type": "buzzerStatusUpdate", "status": "open", "buzzedIn": null})
        );
    }

    #[tokio::test]
    async fn correct_answer_scores_and_reopens() {
        let (state, _store) = setup(&[]).await;
        let (mut host, mut players) = round(&state).await;

        send(&state, &players[0], json!({"type": "buzz"})).await;
        let messages = players[1].drain();
        assert_eq!(of_type(&messages, "buzzedIn")[0]["name"], "A");
        assert_eq!(of_type(&messages, "buzzerStatusUpdate")[0]["status"], "closed");
        host.drain();

        send(&state, &host, json!({"type": "updatePoints", "points": 5, "isCorrect": true})).await;
        let messages = host.drain();
        assert_eq!(messages[0], json!({"type": "correctAnswer", "name": "A", "points": 5}));
        assert_eq!(of_type(&messages, "buzzerStatusUpdate")[0]["status"], "open");

        let quiz = state.quiz().lock().await;
        let a = quiz.ledger().get("A").unwrap().stats;
        assert_eq!(a.total_score, 5);
        assert_eq!(a.correct_answers, 1);
        assert_eq!(a.total_questions_answered, 1);
        assert!(quiz.phase().is_open());
        assert_eq!(quiz.phase().buzzed_in(), None);
    }

    #[tokio::test]
    async fn correct_answer_without_points_uses_the_default() {
        let (state, _store) = setup(&[]).await;
        let (host, players) = round(&state).await;
        send(&state, &players[2], json!({"type": "buzz"})).await;
        send(&state, &host, json!({"type": "updatePoints", "isCorrect": true})).await;
        assert_eq!(score(&state, "C").await, 5);
    }

    #[tokio::test]
    async fn wrong_answer_consoles_the_others() {
        let (state, store) = setup(&[]).await;
        let (mut host, players) = round(&state).await;

        send(&state, &players[0], json!({"type": "buzz"})).await;
        send(&state, &host, json!({"type": "updatePoints", "isCorrect": false})).await;
        let messages = host.drain();
        assert_eq!(of_type(&messages, "wrongAnswer")[0]["name"], "A");

        assert_eq!(score(&state, "A").await, 0);
        assert_eq!(score(&state, "B").await, 1);
        assert_eq!(score(&state, "C").await, 1);
        {
            let quiz = state.quiz().lock().await;
            assert_eq!(quiz.ledger().get("A").unwrap().stats.incorrect_answers, 1);
            assert_eq!(quiz.ledger().get("B").unwrap().stats.total_questions_answered, 0);
            assert!(quiz.phase().is_open());
        }

        let persisted = store.find_player("B".into()).await.unwrap().unwrap();
        assert_eq!(persisted.total_score, 1);
    }

    #[tokio::test]
    async fn adjudication_without_a_buzz_is_ignored() {
        let (state, _store) = setup(&[]).await;
        let (mut host, _players) = round(&state).await;
        send(&state, &host, json!({"type": "updatePoints", "isCorrect": true})).await;
        assert!(host.drain().is_empty());
        assert_eq!(score(&state, "A").await, 0);
    }

    #[tokio::test]
    async fn storage_failure_rolls_back_adjudication() {
        let (state, store) = setup(&[]).await;
        let (mut host, players) = round(&state).await;
        send(&state, &players[0], json!({"type": "buzz"})).await;
        host.drain();

        store.set_failing(true);
        send(&state, &host, json!({"type": "updatePoints", "isCorrect": false})).await;
        let messages = host.drain();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["type"], "error");

        assert_eq!(score(&state, "B").await, 0);
        assert_eq!(
            state.quiz().lock().await.phase().buzzed_in(),
            Some("A")
        );

        store.set_failing(false);
        send(&state, &host, json!({"type": "updatePoints", "isCorrect": false})).await;
        assert_eq!(score(&state, "B").await, 1);
    }

    #[tokio::test]
    async fn partial_write_keeps_only_what_reached_the_store() {
        let (state, store) = setup(&[]).await;
        let (mut host, players) = round(&state).await;
        send(&state, &players[0], json!({"type": "buzz"})).await;
        host.drain();

        // A and B are written, C is not.
        store.fail_after_writes(2);
        send(&state, &host, json!({"type": "updatePoints", "isCorrect": false})).await;
        let messages = host.drain();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["type"], "error");

        for name in ["A", "B", "C"] {
            let persisted = store.find_player(name.into()).await.unwrap().unwrap();
            let quiz = state.quiz().lock().await;
            let record = quiz.ledger().get(name).unwrap();
            assert_eq!(record.stats.total_score, persisted.total_score, "{name}");
            assert_eq!(record.stats.incorrect_answers, persisted.incorrect_answers, "{name}");
        }
        assert_eq!(score(&state, "B").await, 1);
        assert_eq!(score(&state, "C").await, 0);
        assert_eq!(
            state.quiz().lock().await.phase().buzzed_in(),
            Some("A")
        );
    }

    #[tokio::test]
    async fn out_of_range_scores_are_ignored_and_the_session_survives() {
        let (state, _store) = setup(&[]).await;
        let (mut host, players) = round(&state).await;

        send(&state, &host, json!({"type": "manualScoreChange", "name": "A", "newScore": 1})).await;
        host.drain();
        send(
            &state,
            &host,
            json!({"type": "manualScoreChange", "name": "A", "newScore": i64::MIN}),
        )
        .await;
        assert!(host.drain().is_empty());
        assert_eq!(score(&state, "A").await, 1);

        send(
            &state,
            &host,
            json!({"type": "manualScoreChange", "name": "A", "newScore": i64::MAX}),
        )
        .await;
        send(&state, &players[0], json!({"type": "buzz"})).await;
        host.drain();
        send(&state, &host, json!({"type": "updatePoints", "points": 5, "isCorrect": true})).await;
        assert!(host.drain().is_empty());
        assert_eq!(score(&state, "A").await, i64::MAX);
        assert_eq!(
            state.quiz().lock().await.phase().buzzed_in(),
            Some("A")
        );
        assert_eq!(state.sessions().active_players(), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn reset_round_points_keeps_career_scores() {
        let (state, store) = setup(&[]).await;
        let (mut host, mut players) = round(&state).await;
        send(&state, &players[0], json!({"type": "buzz"})).await;
        send(&state, &host, json!({"type": "updatePoints", "points": 3, "isCorrect": true})).await;
        let messages = host.drain();
        let scores = of_type(&messages, "updateScores")[0];
        assert_eq!(scores["roundScores"]["A"], 3);
        assert_eq!(scores["roundScores"]["B"], 0);

        players[1].drain();
        send(&state, &players[1], json!({"type": "resetRoundPoints"})).await;
        assert!(players[1].drain().is_empty());
        assert_eq!(state.quiz().lock().await.round_points("A"), 3);

        send(&state, &host, json!({"type": "resetRoundPoints"})).await;
        let messages = host.drain();
        let scores = of_type(&messages, "updateScores")[0];
        assert_eq!(scores["roundScores"]["A"], 0);
        assert_eq!(scores["scores"]["A"], 3);
        assert_eq!(score(&state, "A").await, 3);
        let persisted = store.find_player("A".into()).await.unwrap().unwrap();
        assert_eq!(persisted.total_score, 3);
        assert_eq!(persisted.correct_answers, 1);
    }

    #[tokio::test]
    async fn manual_score_change_survives_reload() {
        let (state, store) = setup(&["A"]).await;
        let mut host = login(&state, "host", "host").await;

        send(&state, &host, json!({"type": "manualScoreChange", "name": "A", "newScore": 42})).await;
        host.drain();
        send(&state, &host, json!({"type": "getStats"})).await;
        let messages = host.drain();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["stats"]["A"]["totalScore"], 42);

        let reloaded = AppState::new(AppConfig::default());
        reloaded.install_store(Arc::new(store.clone())).await.unwrap();
        assert_eq!(score(&reloaded, "A").await, 42);
    }

    #[tokio::test]
    async fn manual_score_change_for_unknown_player_is_ignored() {
        let (state, _store) = setup(&[]).await;
        let mut host = login(&state, "host", "host").await;
        send(&state, &host, json!({"type": "manualScoreChange", "name": "ghost", "newScore": 1})).await;
        assert!(host.drain().is_empty());
    }

    #[tokio::test]
    async fn next_question_at_the_end_clamps_and_resets_buzzer() {
        let (state, _store) = setup(&[]).await;
        let (mut host, players) = round(&state).await;

        send(&state, &host, json!({"type": "nextQuestion"})).await;
        send(&state, &players[0], json!({"type": "buzz"})).await;
        host.drain();

        send(&state, &host, json!({"type": "nextQuestion"})).await;
        let messages = host.drain();
        assert_eq!(of_type(&messages, "questionUpdate")[0]["questionIndex"], 1);
        assert_eq!(of_type(&messages, "hostQuestionUpdate")[0]["correctAnswer"], "42");
        assert_eq!(of_type(&messages, "buzzerStatusUpdate")[0]["status"], "open");

        send(&state, &host, json!({"type": "prevQuestion"})).await;
        send(&state, &host, json!({"type": "prevQuestion"})).await;
        assert_eq!(state.quiz().lock().await.current_question_index(), 0);
    }

    #[tokio::test]
    async fn players_never_see_expected_answers() {
        let (state, _store) = setup(&[]).await;
        let (host, mut players) = round(&state).await;
        send(&state, &host, json!({"type": "nextQuestion"})).await;
        send(&state, &players[0], json!({"type": "submitAnswer", "answer": "42"})).await;

        for message in players[1].drain() {
            assert_ne!(message["type"], "hostQuestionUpdate");
            assert_ne!(message["type"], "submittedAnswers");
            assert!(!message.to_string().contains("\"42\""));
        }
    }

    #[tokio::test]
    async fn answers_reach_hosts_with_grading_hint() {
        let (state, _store) = setup(&[]).await;
        let (mut host, players) = round(&state).await;

        send(&state, &players[0], json!({"type": "liveUpdate", "text": "Par"})).await;
        let messages = host.drain();
        assert_eq!(messages[0]["liveAnswers"], json!({"A": "Par"}));

        send(&state, &players[0], json!({"type": "submitAnswer", "answer": " paris "})).await;
        let messages = host.drain();
        assert_eq!(
            messages[0]["submittedAnswers"]["A"],
            json!({"answer": " paris ", "matchesExpected": true})
        );
    }

    #[tokio::test]
    async fn non_host_admin_requests_are_silently_ignored() {
        let (state, _store) = setup(&[]).await;
        let (mut host, mut players) = round(&state).await;
        send(&state, &players[0], json!({"type": "buzz"})).await;
        host.drain();
        for client in players.iter_mut() {
            client.drain();
        }

        for message in [
            json!({"type": "resetAllPlayerStats"}),
            json!({"type": "updatePoints", "isCorrect": true}),
            json!({"type": "reset"}),
            json!({"type": "getStats"}),
            json!({"type": "manualScoreChange", "name": "B", "newScore": 99}),
        ] {
            send(&state, &players[1], message).await;
        }

        assert!(host.drain().is_empty());
        for client in players.iter_mut() {
            assert!(client.drain().is_empty());
        }
        assert_eq!(score(&state, "B").await, 0);
        assert_eq!(
            state.quiz().lock().await.phase().buzzed_in(),
            Some("A")
        );
    }

    #[tokio::test]
    async fn unauthenticated_clients_cannot_buzz() {
        let (state, _store) = setup(&[]).await;
        let (mut host, _players) = round(&state).await;
        let mut stranger = connect(&state).await;
        stranger.drain();

        send(&state, &stranger, json!({"type": "buzz"})).await;
        assert!(host.drain().is_empty());
        assert!(state.quiz().lock().await.phase().is_open());
    }

    #[tokio::test]
    async fn reset_all_stats_zeroes_everyone() {
        let (state, store) = setup(&[]).await;
        let (host, players) = round(&state).await;
        send(&state, &players[0], json!({"type": "buzz"})).await;
        send(&state, &host, json!({"type": "updatePoints", "isCorrect": true})).await;

        send(&state, &host, json!({"type": "resetAllStats"})).await;
        assert_eq!(score(&state, "A").await, 0);
        let persisted = store.find_player("A".into()).await.unwrap().unwrap();
        assert_eq!(persisted.correct_answers, 0);
        assert_eq!(persisted.password, "pw");
    }

    #[tokio::test]
    async fn last_login_wins() {
        let (state, _store) = setup(&["A"]).await;
        let mut first = login(&state, "A", "pw").await;
        let _second = login(&state, "A", "pw").await;

        first.drain();
        assert!(first.closed);
        assert_eq!(
            state.sessions().role(first.id),
            Some(SessionRole::Unauthenticated)
        );
        assert_eq!(state.sessions().active_players(), vec!["A"]);
    }

    #[tokio::test]
    async fn disconnect_refreshes_scores_and_keeps_the_buzz() {
        let (state, _store) = setup(&[]).await;
        let (mut host, players) = round(&state).await;
        send(&state, &players[0], json!({"type": "buzz"})).await;
        host.drain();

        client_disconnected(&state, players[0].id).await;
        let messages = host.drain();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["activePlayers"], json!(["B", "C"]));
        assert_eq!(
            state.quiz().lock().await.phase().buzzed_in(),
            Some("A")
        );

        send(&state, &host, json!({"type": "updatePoints", "isCorrect": true})).await;
        assert_eq!(score(&state, "A").await, 5);
    }

    #[tokio::test]
    async fn load_quiz_persists_and_broadcasts_count() {
        let (state, store) = setup(&[]).await;
        let (mut host, mut players) = round(&state).await;

        send(
            &state,
            &host,
            json!({"type": "loadQuiz", "quiz": [{"question": "new", "answer": "secret"}]}),
        )
        .await;

        let messages = players[0].drain();
        assert_eq!(messages[0], json!({"type": "quizLoaded", "questionCount": 1}));
        assert!(!Value::Array(messages.clone()).to_string().contains("secret"));
        assert_eq!(of_type(&host.drain(), "hostQuestionUpdate")[0]["correctAnswer"], "secret");

        let stored = store.load_questions().await.unwrap();
        assert_eq!(stored, vec![question("new", "secret")]);
        assert_eq!(state.quiz().lock().await.current_question_index(), 0);
    }

    #[tokio::test]
    async fn degraded_mode_keeps_host_and_buzzer_working() {
        let state = AppState::new(AppConfig::default());
        let mut host = login(&state, "host", "host").await;
        assert_eq!(state.sessions().role(host.id), Some(SessionRole::Host));

        let mut player = connect(&state).await;
        player.drain();
        send(&state, &player, json!({"type": "auth", "name": "A", "password": "pw"})).await;
        assert_eq!(player.drain()[0]["type"], "error");

        send(&state, &host, json!({"type": "openBuzzer"})).await;
        assert!(state.quiz().lock().await.phase().is_open());

        send(&state, &host, json!({"type": "loadQuiz", "quiz": [{"question": "q", "answer": "a"}]})).await;
        let messages = host.drain();
        assert_eq!(messages.last().unwrap()["type"], "error");
        assert!(state.quiz().lock().await.questions().is_empty());
    }
}

pub mod buzzer;
pub mod game;
pub mod ledger;
pub mod session;
pub mod transitions;

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::sync::{Mutex, RwLock, watch};
use tracing::info;

use crate::{
    config::AppConfig,
    dao::store::QuizStore,
    error::ServiceError,
    state::{game::QuizSession, session::SessionRegistry, transitions::bounded},
};

pub use self::buzzer::{AbortError, ApplyError, PlanError};

/// Shared handle on the application state.
pub type SharedState = Arc<AppState>;
/// Upper bound on storage work performed while a message is being handled.
pub const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_secs(5);

/// Central application state: configuration, storage handle, connected clients and the quiz.
///
/// Every state-mutating operation runs while holding the [`QuizSession`] lock, which makes it
/// the single serialization point for message handling.
pub struct AppState {
    config: Arc<AppConfig>,
    store: RwLock<Option<Arc<dyn QuizStore>>>,
    degraded: watch::Sender<bool>,
    sessions: SessionRegistry,
    quiz: Mutex<QuizSession>,
    transition_timeout: Option<Duration>,
    unbounded_writes: AtomicBool,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_transition_timeout(config, Some(DEFAULT_TRANSITION_TIMEOUT))
    }

    /// Same as [`AppState::new`] with an explicit bound on storage work.
    pub fn with_transition_timeout(config: AppConfig, limit: Option<Duration>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config: Arc::new(config),
            store: RwLock::new(None),
            degraded: degraded_tx,
            sessions: SessionRegistry::new(),
            quiz: Mutex::new(QuizSession::new()),
            transition_timeout: limit,
            unbounded_writes: AtomicBool::new(false),
        })
    }

    /// Application configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Registry of connected clients.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// The quiz session guarded by the serialization lock.
    pub fn quiz(&self) -> &Mutex<QuizSession> {
        &self.quiz
    }

    /// Upper bound applied to storage work, `None` when the installed store cannot abandon writes.
    pub fn transition_timeout(&self) -> Option<Duration> {
        if self.unbounded_writes.load(Ordering::Acquire) {
            None
        } else {
            self.transition_timeout
        }
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn QuizStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the current store or fail with [`ServiceError::Degraded`].
    pub async fn require_store(&self) -> Result<Arc<dyn QuizStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Hydrate the quiz from a freshly connected store, install it and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn QuizStore>) -> Result<(), ServiceError> {
        let (players, questions) = bounded(self.transition_timeout, async {
            let (players, questions) =
                tokio::try_join!(store.list_players(), store.load_questions())?;
            Ok::<_, ServiceError>((players, questions))
        })
        .await?;

        info!(
            players = players.len(),
            questions = questions.len(),
            "hydrated quiz state from storage"
        );
        self.quiz.lock().await.hydrate(players, questions);

        {
            let mut guard = self.store.write().await;
            self.unbounded_writes
                .store(store.writes_outlive_cancellation(), Ordering::Release);
            *guard = Some(store);
        }
        self.update_degraded(false);
        Ok(())
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }
}

//! Non-durable storage backend keeping everything in process memory.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use tokio::sync::RwLock;

use crate::dao::{
    models::{PlayerEntity, QuestionEntity},
    storage::{StorageError, StorageResult},
    store::{PlayerStore, QuestionStore, QuizStore},
};

#[derive(Clone, Default)]
/// In-memory [`QuizStore`]. Cloning shares the same underlying data.
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    players: RwLock<IndexMap<String, PlayerEntity>>,
    questions: RwLock<Vec<QuestionEntity>>,
    failing: AtomicBool,
    /// Player records still writable before saves start failing; `None` is unlimited.
    write_budget: Mutex<Option<usize>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with players and questions.
    pub fn seeded(players: Vec<PlayerEntity>, questions: Vec<QuestionEntity>) -> Self {
        let players = players
            .into_iter()
            .map(|player| (player.name.clone(), player))
            .collect();
        Self {
            inner: Arc::new(MemoryInner {
                players: RwLock::new(players),
                questions: RwLock::new(questions),
                failing: AtomicBool::new(false),
                write_budget: Mutex::new(None),
            }),
        }
    }

    /// Make every subsequent operation fail until toggled back.
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::SeqCst);
    }

    /// Let the next `records` player writes succeed, then fail every later one. A batch that
    /// crosses the limit is left partially written.
    pub fn fail_after_writes(&self, records: usize) {
        *self
            .inner
            .write_budget
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(records);
    }

    fn spend_write(inner: &MemoryInner) -> StorageResult<()> {
        let mut budget = inner
            .write_budget
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match budget.as_mut() {
            Some(0) => Err(StorageError::Rejected("memory store write budget exhausted".into())),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn check(inner: &MemoryInner) -> StorageResult<()> {
        if inner.failing.load(Ordering::SeqCst) {
            Err(StorageError::Rejected("memory store is failing".into()))
        } else {
            Ok(())
        }
    }
}

impl PlayerStore for MemoryStore {
    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Self::check(&inner)?;
            Ok(inner.players.read().await.values().cloned().collect())
        })
    }

    fn find_player(&self, name: String) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Self::check(&inner)?;
            Ok(inner.players.read().await.get(&name).cloned())
        })
    }

    fn save_players(&self, players: Vec<PlayerEntity>) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Self::check(&inner)?;
            let mut slot = inner.players.write().await;
            for player in players {
                Self::spend_write(&inner)?;
                slot.insert(player.name.clone(), player);
            }
            Ok(())
        })
    }

    fn reset_all_stats(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Self::check(&inner)?;
            let mut slot = inner.players.write().await;
            for player in slot.values_mut() {
                player.total_score = 0;
                player.correct_answers = 0;
                player.incorrect_answers = 0;
                player.total_questions_answered = 0;
            }
            Ok(())
        })
    }
}

impl QuestionStore for MemoryStore {
    fn load_questions(&self) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Self::check(&inner)?;
            Ok(inner.questions.read().await.clone())
        })
    }

    fn replace_questions(
        &self,
        questions: Vec<QuestionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Self::check(&inner)?;
            *inner.questions.write().await = questions;
            Ok(())
        })
    }
}

impl QuizStore for MemoryStore {
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { Self::check(&inner) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.health_check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(name: &str, total_score: i64) -> PlayerEntity {
        PlayerEntity {
            name: name.into(),
            password: "pw".into(),
            total_score,
            correct_answers: 0,
            incorrect_answers: 0,
            total_questions_answered: 0,
        }
    }

    #[tokio::test]
    async fn write_budget_leaves_batches_partially_written() {
        let store = MemoryStore::new();
        store.fail_after_writes(1);

        let result = store
            .save_players(vec![player("a", 1), player("b", 2)])
            .await;

        assert!(matches!(result, Err(StorageError::Rejected(_))));
        assert_eq!(store.find_player("a".into()).await.unwrap().unwrap().total_score, 1);
        assert!(store.find_player("b".into()).await.unwrap().is_none());
    }
}

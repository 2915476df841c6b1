#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod file;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;

use crate::dao::{
    models::{PlayerEntity, QuestionEntity},
    storage::StorageResult,
};

/// Durable map from player name to credential and counters.
pub trait PlayerStore: Send + Sync {
    /// Load every known player.
    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>>;
    /// Fetch a single player by exact name.
    fn find_player(&self, name: String) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    /// Insert or replace the given players, keyed by name.
    fn save_players(&self, players: Vec<PlayerEntity>) -> BoxFuture<'static, StorageResult<()>>;
    /// Zero the four counters of every player without deleting anyone.
    fn reset_all_stats(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Durable ordered sequence of quiz questions.
pub trait QuestionStore: Send + Sync {
    /// Load the whole quiz in order.
    fn load_questions(&self) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>>;
    /// Replace the whole quiz.
    fn replace_questions(
        &self,
        questions: Vec<QuestionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>>;
}

/// Complete storage backend installed into the application state.
pub trait QuizStore: PlayerStore + QuestionStore {
    /// Cheap liveness probe used by the storage supervisor.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the underlying connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Whether a write keeps running after its future is dropped. Such stores are never put
    /// under a deadline, since a timeout could not undo the write.
    fn writes_outlive_cancellation(&self) -> bool {
        false
    }
}

use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Collection, Database, bson::doc, options::IndexOptions};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoOperation, MongoResult},
    models::{MongoPlayerDocument, MongoQuizDocument, QUIZ_DOCUMENT_ID, doc_id},
};
use crate::dao::{
    models::{PlayerEntity, QuestionEntity},
    storage::StorageResult,
    store::{PlayerStore, QuestionStore, QuizStore},
};

const PLAYER_COLLECTION_NAME: &str = "players";
const QUIZ_COLLECTION_NAME: &str = "quizzes";

#[derive(Clone)]
/// [`QuizStore`] backed by MongoDB.
pub struct MongoQuizStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    database: RwLock<Database>,
    config: MongoConfig,
}

impl MongoQuizStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let database = config.open().await?;

        let store = Self {
            inner: Arc::new(MongoInner {
                database: RwLock::new(database),
                config,
            }),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.players().await;
        let index = mongodb::IndexModel::builder()
            .keys(doc! { "totalScore": -1 })
            .options(
                IndexOptions::builder()
                    .name(Some("player_score_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(MongoDaoError::during(MongoOperation::CreateIndex))?;
        Ok(())
    }

    async fn database(&self) -> Database {
        self.inner.database.read().await.clone()
    }

    async fn players(&self) -> Collection<MongoPlayerDocument> {
        self.database()
            .await
            .collection::<MongoPlayerDocument>(PLAYER_COLLECTION_NAME)
    }

    async fn quizzes(&self) -> Collection<MongoQuizDocument> {
        self.database()
            .await
            .collection::<MongoQuizDocument>(QUIZ_COLLECTION_NAME)
    }

    async fn ping(&self) -> MongoResult<()> {
        self.database()
            .await
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(MongoDaoError::during(MongoOperation::Ping))?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let database = self.inner.config.open().await?;
        *self.inner.database.write().await = database;
        Ok(())
    }

    async fn list_players(&self) -> MongoResult<Vec<PlayerEntity>> {
        let documents: Vec<MongoPlayerDocument> = self
            .players()
            .await
            .find(doc! {})
            .sort(doc! { "_id": 1 })
            .await
            .map_err(MongoDaoError::during(MongoOperation::ListPlayers))?
            .try_collect()
            .await
            .map_err(MongoDaoError::during(MongoOperation::ListPlayers))?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn find_player(&self, name: String) -> MongoResult<Option<PlayerEntity>> {
        let document = self
            .players()
            .await
            .find_one(doc_id(&name))
            .await
            .map_err(MongoDaoError::during(MongoOperation::FindPlayer))?;
        Ok(document.map(Into::into))
    }

    async fn save_players(&self, players: Vec<PlayerEntity>) -> MongoResult<()> {
        let collection = self.players().await;
        for player in players {
            let document: MongoPlayerDocument = player.into();
            collection
                .replace_one(doc_id(&document.name), &document)
                .upsert(true)
                .await
                .map_err(MongoDaoError::during(MongoOperation::SavePlayer))?;
        }
        Ok(())
    }

    async fn reset_all_stats(&self) -> MongoResult<()> {
        self.players()
            .await
            .update_many(
                doc! {},
                doc! { "$set": {
                    "totalScore": 0_i64,
                    "correctAnswers": 0_i64,
                    "incorrectAnswers": 0_i64,
                    "totalQuestionsAnswered": 0_i64,
                } },
            )
            .await
            .map_err(MongoDaoError::during(MongoOperation::ResetStats))?;
        Ok(())
    }

    async fn load_questions(&self) -> MongoResult<Vec<QuestionEntity>> {
        let document = self
            .quizzes()
            .await
            .find_one(doc_id(QUIZ_DOCUMENT_ID))
            .await
            .map_err(MongoDaoError::during(MongoOperation::LoadQuiz))?;
        Ok(document.map(|quiz| quiz.questions).unwrap_or_default())
    }

    async fn replace_questions(&self, questions: Vec<QuestionEntity>) -> MongoResult<()> {
        let document: MongoQuizDocument = questions.into();
        self.quizzes()
            .await
            .replace_one(doc_id(QUIZ_DOCUMENT_ID), &document)
            .upsert(true)
            .await
            .map_err(MongoDaoError::during(MongoOperation::SaveQuiz))?;
        Ok(())
    }
}

impl PlayerStore for MongoQuizStore {
    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_players().await.map_err(Into::into) })
    }

    fn find_player(&self, name: String) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_player(name).await.map_err(Into::into) })
    }

    fn save_players(&self, players: Vec<PlayerEntity>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_players(players).await.map_err(Into::into) })
    }

    fn reset_all_stats(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.reset_all_stats().await.map_err(Into::into) })
    }
}

impl QuestionStore for MongoQuizStore {
    fn load_questions(&self) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.load_questions().await.map_err(Into::into) })
    }

    fn replace_questions(
        &self,
        questions: Vec<QuestionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.replace_questions(questions).await.map_err(Into::into) })
    }
}

impl QuizStore for MongoQuizStore {
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.reconnect().await.map_err(Into::into) })
    }
}

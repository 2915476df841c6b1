use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tokio::{fs, sync::Mutex};
use tracing::info;

use super::{
    config::FileConfig,
    error::{FileResult, FileStoreError},
};
use crate::dao::{
    models::{PlayerEntity, QuestionEntity},
    storage::{StorageError, StorageResult},
    store::{PlayerStore, QuestionStore, QuizStore},
};

/// Top-level layout of `playerData.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PlayerDataDocument {
    #[serde(default)]
    users: Vec<PlayerEntity>,
    /// Unrelated top-level keys are carried through rewrites untouched.
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Clone)]
/// [`QuizStore`] persisting players and questions as pretty-printed JSON files.
pub struct FileStore {
    inner: Arc<FileInner>,
}

struct FileInner {
    config: FileConfig,
    /// Serializes read-modify-write cycles on the data files.
    write_gate: Mutex<()>,
}

impl FileStore {
    /// Open the store, creating the data directory when missing.
    pub async fn open(config: FileConfig) -> FileResult<Self> {
        fs::create_dir_all(&config.data_dir)
            .await
            .map_err(|source| FileStoreError::CreateDir {
                path: config.data_dir.clone(),
                source,
            })?;
        info!(dir = %config.data_dir.display(), "using JSON file storage");

        Ok(Self {
            inner: Arc::new(FileInner {
                config,
                write_gate: Mutex::new(()),
            }),
        })
    }

    fn players_path(&self) -> PathBuf {
        self.inner.config.players_path()
    }

    fn quiz_path(&self) -> PathBuf {
        self.inner.config.quiz_path()
    }

    async fn read_players(&self) -> FileResult<PlayerDataDocument> {
        Ok(read_json(&self.players_path()).await?.unwrap_or_default())
    }

    async fn update_players<F>(&self, mutate: F) -> FileResult<()>
    where
        F: FnOnce(&mut Vec<PlayerEntity>),
    {
        let _gate = self.inner.write_gate.lock().await;
        let mut document = self.read_players().await?;
        mutate(&mut document.users);
        write_json(&self.players_path(), &document).await
    }

    async fn save_players(&self, players: Vec<PlayerEntity>) -> FileResult<()> {
        self.update_players(|users| {
            for player in players {
                match users.iter_mut().find(|user| user.name == player.name) {
                    Some(existing) => *existing = player,
                    None => users.push(player),
                }
            }
        })
        .await
    }

    async fn reset_all_stats(&self) -> FileResult<()> {
        self.update_players(|users| {
            for user in users.iter_mut() {
                user.total_score = 0;
                user.correct_answers = 0;
                user.incorrect_answers = 0;
                user.total_questions_answered = 0;
            }
        })
        .await
    }

    async fn replace_questions(&self, questions: Vec<QuestionEntity>) -> FileResult<()> {
        let _gate = self.inner.write_gate.lock().await;
        write_json(&self.quiz_path(), &questions).await
    }
}

/// Read and decode a JSON file, treating a missing file as `None`.
async fn read_json<T>(path: &Path) -> FileResult<Option<T>>
where
    T: DeserializeOwned,
{
    let contents = match fs::read(path).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(FileStoreError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    serde_json::from_slice(&contents)
        .map(Some)
        .map_err(|source| FileStoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Write a JSON document next to `path` and atomically move it into place.
async fn write_json<T>(path: &Path, value: &T) -> FileResult<()>
where
    T: ?Sized + Serialize,
{
    let payload =
        serde_json::to_vec_pretty(value).map_err(|source| FileStoreError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, payload)
        .await
        .map_err(|source| FileStoreError::Write {
            path: tmp_path.clone(),
            source,
        })?;
    fs::rename(&tmp_path, path)
        .await
        .map_err(|source| FileStoreError::Write {
            path: path.to_path_buf(),
            source,
        })
}

impl PlayerStore for FileStore {
    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.read_players().await?.users) })
    }

    fn find_player(&self, name: String) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store.read_players().await?;
            Ok(document.users.into_iter().find(|user| user.name == name))
        })
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

impl QuestionStore for FileStore {
    fn load_questions(&self) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let questions = read_json::<Vec<QuestionEntity>>(&store.quiz_path()).await?;
            Ok(questions.unwrap_or_default())
        })
    }

    fn replace_questions(
        &self,
        questions: Vec<QuestionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.replace_questions(questions).await.map_err(Into::into) })
    }
}

impl QuizStore for FileStore {
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let dir = store.inner.config.data_dir.clone();
            match fs::metadata(&dir).await {
                Ok(meta) if meta.is_dir() => Ok(()),
                Ok(_) => Err(StorageError::from(FileStoreError::Read {
                    path: dir,
                    source: ErrorKind::NotADirectory.into(),
                })),
                Err(source) => Err(StorageError::from(FileStoreError::Read { path: dir, source })),
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let dir = store.inner.config.data_dir.clone();
            fs::create_dir_all(&dir)
                .await
                .map_err(|source| StorageError::from(FileStoreError::CreateDir { path: dir, source }))
        })
    }

    /// `tokio::fs` runs on the blocking pool, so a dropped write still reaches the disk.
    fn writes_outlive_cancellation(&self) -> bool {
        true
    }
}

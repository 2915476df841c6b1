use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::{Serialize, de::DeserializeOwned};

use crate::dao::{
    models::{PlayerEntity, QuestionEntity},
    storage::StorageResult,
    store::{PlayerStore, QuestionStore, QuizStore},
};

use super::{
    config::{CouchConfig, CouchCredentials},
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, CouchPlayerDocument, CouchQuizDocument, END_SUFFIX, PLAYER_PREFIX,
        QUIZ_DOC_ID, player_doc_id,
    },
};

const ALL_DOCS: &str = "_all_docs";

/// [`QuizStore`] backed by a CouchDB database over HTTP.
///
/// Players live in one document each (`player::<name>`); the question list is a single document.
#[derive(Clone)]
pub struct CouchQuizStore {
    client: Client,
    database_url: Arc<Url>,
    credentials: Option<Arc<CouchCredentials>>,
}

impl CouchQuizStore {
    /// Build the HTTP client and create the database when it does not exist yet.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let database_url = config.database_url()?;
        let client = Client::builder().build().map_err(CouchDaoError::Client)?;

        let store = Self {
            client,
            database_url: Arc::new(database_url),
            credentials: config.credentials.map(Arc::new),
        };
        store.ensure_database().await?;
        Ok(store)
    }

    fn url_for(&self, target: Option<&str>) -> Url {
        let mut url = (*self.database_url).clone();
        if let (Some(target), Ok(mut segments)) = (target, url.path_segments_mut()) {
            segments.push(target);
        }
        url
    }

    /// Send one request and return the response, whatever its status.
    async fn send(
        &self,
        method: Method,
        target: Option<&str>,
        build: impl FnOnce(reqwest::RequestBuilder) -> reqwest::RequestBuilder,
    ) -> CouchResult<Response> {
        let mut request = self.client.request(method.clone(), self.url_for(target));
        if let Some(credentials) = &self.credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }
        build(request)
            .send()
            .await
            .map_err(|source| CouchDaoError::Transport {
                method: method.clone(),
                target: describe(target),
                source,
            })
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let probe = self.send(Method::GET, None, |r| r).await?;
        match probe.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let created = self.send(Method::PUT, None, |r| r).await?;
                expect_success(&Method::PUT, None, &created)
            }
            status => Err(CouchDaoError::Status {
                method: Method::GET,
                target: describe(None),
                status,
            }),
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, doc_id: &str) -> CouchResult<Option<T>> {
        let response = self.send(Method::GET, Some(doc_id), |r| r).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        expect_success(&Method::GET, Some(doc_id), &response)?;
        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|source| CouchDaoError::Payload {
                target: doc_id.to_owned(),
                source,
            })
    }

    async fn store<T: Serialize + ?Sized>(&self, doc_id: &str, document: &T) -> CouchResult<()> {
        let response = self
            .send(Method::PUT, Some(doc_id), |r| r.json(document))
            .await?;
        expect_success(&Method::PUT, Some(doc_id), &response)
    }

    /// Every document whose id starts with `prefix`, via a key range scan.
    async fn scan<T: DeserializeOwned>(&self, prefix: &str) -> CouchResult<Vec<T>> {
        let range = [
            ("include_docs", "true".to_owned()),
            ("startkey", format!("\"{prefix}\"")),
            ("endkey", format!("\"{prefix}{END_SUFFIX}\"")),
        ];
        let response = self
            .send(Method::GET, Some(ALL_DOCS), |r| r.query(&range))
            .await?;
        expect_success(&Method::GET, Some(ALL_DOCS), &response)?;

        let page = response
            .json::<AllDocsResponse>()
            .await
            .map_err(|source| CouchDaoError::Payload {
                target: ALL_DOCS.to_owned(),
                source,
            })?;

        page.rows
            .into_iter()
            .filter_map(|row| row.doc)
            .map(|doc| {
                serde_json::from_value(doc).map_err(|source| CouchDaoError::Document {
                    target: ALL_DOCS.to_owned(),
                    source,
                })
            })
            .collect()
    }

    /// Current revision of `doc_id`, needed to overwrite it.
    async fn revision_of<T: DeserializeOwned>(
        &self,
        doc_id: &str,
        rev: impl FnOnce(T) -> Option<String>,
    ) -> CouchResult<Option<String>> {
        Ok(self.fetch::<T>(doc_id).await?.and_then(rev))
    }

    async fn upsert_player(&self, player: PlayerEntity) -> CouchResult<()> {
        let doc_id = player_doc_id(&player.name);
        let rev = self
            .revision_of(&doc_id, |doc: CouchPlayerDocument| doc.rev)
            .await?;
        self.store(&doc_id, &CouchPlayerDocument::from_entity(player, rev))
            .await
    }
}

fn expect_success(method: &Method, target: Option<&str>, response: &Response) -> CouchResult<()> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(CouchDaoError::Status {
            method: method.clone(),
            target: describe(target),
            status: response.status(),
        })
    }
}

fn describe(target: Option<&str>) -> String {
    target.unwrap_or("<database>").to_owned()
}

impl PlayerStore for CouchQuizStore {
    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let documents = store.scan::<CouchPlayerDocument>(PLAYER_PREFIX).await?;
            Ok(documents.into_iter().map(|doc| doc.player).collect())
        })
    }

    fn find_player(&self, name: String) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .fetch::<CouchPlayerDocument>(&player_doc_id(&name))
                .await?;
            Ok(document.map(|doc| doc.player))
        })
    }

    fn save_players(&self, players: Vec<PlayerEntity>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            for player in players {
                store.upsert_player(player).await?;
            }
            Ok(())
        })
    }

    fn reset_all_stats(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            for mut document in store.scan::<CouchPlayerDocument>(PLAYER_PREFIX).await? {
                let player = &mut document.player;
                player.total_score = 0;
                player.correct_answers = 0;
                player.incorrect_answers = 0;
                player.total_questions_answered = 0;
                store.store(&document.id, &document).await?;
            }
            Ok(())
        })
    }
}

impl QuestionStore for CouchQuizStore {
    fn load_questions(&self) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store.fetch::<CouchQuizDocument>(QUIZ_DOC_ID).await?;
            Ok(document.map(|doc| doc.questions).unwrap_or_default())
        })
    }

    fn replace_questions(
        &self,
        questions: Vec<QuestionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let rev = store
                .revision_of(QUIZ_DOC_ID, |doc: CouchQuizDocument| doc.rev)
                .await?;
            let document = CouchQuizDocument::from_questions(questions, rev);
            Ok(store.store(QUIZ_DOC_ID, &document).await?)
        })
    }
}

impl QuizStore for CouchQuizStore {
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let response = store.send(Method::GET, None, |r| r).await?;
            Ok(expect_success(&Method::GET, None, &response)?)
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.ensure_database().await?) })
    }
}

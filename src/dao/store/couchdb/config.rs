use reqwest::Url;

use super::error::{CouchDaoError, CouchResult};

const BASE_URL_ENV: &str = "COUCH_BASE_URL";
const DATABASE_ENV: &str = "COUCH_DB";
const USERNAME_ENV: &str = "COUCH_USERNAME";
const PASSWORD_ENV: &str = "COUCH_PASSWORD";
const DEFAULT_DATABASE: &str = "quiz_buzzer";

/// Basic-auth pair sent with every request.
#[derive(Debug, Clone)]
pub struct CouchCredentials {
    /// CouchDB user.
    pub username: String,
    /// CouchDB password.
    pub password: String,
}

/// Where the quiz database lives and how to authenticate against it.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    /// Server root, e.g. `http://localhost:5984`.
    pub base_url: String,
    /// Database holding the player and quiz documents.
    pub database: String,
    /// Optional basic-auth credentials.
    pub credentials: Option<CouchCredentials>,
}

impl CouchConfig {
    /// Anonymous access to `database` on the server at `base_url`.
    pub fn new(base_url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            database: database.into(),
            credentials: None,
        }
    }

    /// `COUCH_BASE_URL` is required; `COUCH_DB` defaults to `quiz_buzzer`. Credentials are used
    /// only when both `COUCH_USERNAME` and `COUCH_PASSWORD` are set.
    pub fn from_env() -> CouchResult<Self> {
        let base_url = std::env::var(BASE_URL_ENV)
            .map_err(|_| CouchDaoError::MissingEnvVar { var: BASE_URL_ENV })?;
        let database = std::env::var(DATABASE_ENV).unwrap_or_else(|_| DEFAULT_DATABASE.into());
        let credentials = std::env::var(USERNAME_ENV)
            .ok()
            .zip(std::env::var(PASSWORD_ENV).ok())
            .map(|(username, password)| CouchCredentials { username, password });

        Ok(Self {
            base_url,
            database,
            credentials,
        })
    }

    /// URL of the database itself; documents are addressed below it.
    pub fn database_url(&self) -> CouchResult<Url> {
        let invalid = || CouchDaoError::InvalidBaseUrl {
            url: self.base_url.clone(),
        };
        let mut url = Url::parse(self.base_url.trim_end_matches('/')).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .push(&self.database);
        Ok(url)
    }
}

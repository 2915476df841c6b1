use std::time::Duration;

use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use tokio::time::sleep;
use tracing::debug;

use super::error::{MongoDaoError, MongoResult};

const URI_ENV: &str = "MONGO_URI";
const DATABASE_ENV: &str = "MONGO_DB";
const DEFAULT_DATABASE: &str = "quiz_buzzer";

const PING_ATTEMPTS: u32 = 5;
const FIRST_PING_DELAY: Duration = Duration::from_millis(250);
const MAX_PING_DELAY: Duration = Duration::from_secs(5);

/// Parsed driver options plus the database holding the quiz collections.
#[derive(Clone)]
pub struct MongoConfig {
    options: ClientOptions,
    database: String,
}

impl MongoConfig {
    /// Parse `uri`; the database defaults to `quiz_buzzer`.
    pub async fn parse(uri: &str, database: Option<String>) -> MongoResult<Self> {
        let options = ClientOptions::parse(uri)
            .await
            .map_err(MongoDaoError::InvalidUri)?;
        Ok(Self {
            options,
            database: database.unwrap_or_else(|| DEFAULT_DATABASE.to_owned()),
        })
    }

    /// Read `MONGO_URI` (required) and `MONGO_DB`.
    pub async fn from_env() -> MongoResult<Self> {
        let uri =
            std::env::var(URI_ENV).map_err(|_| MongoDaoError::MissingEnvVar { var: URI_ENV })?;
        Self::parse(&uri, std::env::var(DATABASE_ENV).ok()).await
    }

    /// Open a fresh client and wait for the server to answer a ping.
    pub async fn open(&self) -> MongoResult<Database> {
        let client = Client::with_options(self.options.clone()).map_err(MongoDaoError::Client)?;
        let database = client.database(&self.database);

        let mut delay = FIRST_PING_DELAY;
        let mut attempt = 1;
        loop {
            match database.run_command(doc! { "ping": 1 }).await {
                Ok(_) => return Ok(database),
                Err(source) if attempt >= PING_ATTEMPTS => {
                    return Err(MongoDaoError::Unreachable {
                        attempts: attempt,
                        source,
                    });
                }
                Err(err) => {
                    debug!(attempt, error = %err, "MongoDB ping failed; retrying");
                    sleep(delay).await;
                    delay = (delay * 2).min(MAX_PING_DELAY);
                    attempt += 1;
                }
            }
        }
    }
}

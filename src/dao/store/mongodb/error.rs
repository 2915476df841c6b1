use std::fmt;

use mongodb::error::Error as MongoError;
use thiserror::Error;

pub type MongoResult<T> = Result<T, MongoDaoError>;

/// Store operation that hit a MongoDB error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MongoOperation {
    Ping,
    CreateIndex,
    ListPlayers,
    FindPlayer,
    SavePlayer,
    ResetStats,
    LoadQuiz,
    SaveQuiz,
}

impl fmt::Display for MongoOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MongoOperation::Ping => "ping",
            MongoOperation::CreateIndex => "create index",
            MongoOperation::ListPlayers => "list players",
            MongoOperation::FindPlayer => "find player",
            MongoOperation::SavePlayer => "save player",
            MongoOperation::ResetStats => "reset player statistics",
            MongoOperation::LoadQuiz => "load quiz",
            MongoOperation::SaveQuiz => "save quiz",
        })
    }
}

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("invalid MongoDB connection URI")]
    InvalidUri(#[source] MongoError),
    #[error("failed to build MongoDB client")]
    Client(#[source] MongoError),
    #[error("MongoDB unreachable after {attempts} ping attempt(s)")]
    Unreachable {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB {operation} failed")]
    Operation {
        operation: MongoOperation,
        #[source]
        source: MongoError,
    },
}

impl MongoDaoError {
    /// Adapter for `map_err` tagging a driver error with the failing operation.
    pub fn during(operation: MongoOperation) -> impl FnOnce(MongoError) -> Self {
        move |source| MongoDaoError::Operation { operation, source }
    }
}


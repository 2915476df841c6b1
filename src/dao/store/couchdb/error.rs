//! Failures of the CouchDB backend.

use reqwest::{Method, StatusCode};
use thiserror::Error;

/// Result alias for CouchDB operations.
pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Something went wrong while talking to CouchDB. `target` names the database or document.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    /// A required environment variable is not set.
    #[error("missing CouchDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// The configured server URL cannot address a database.
    #[error("invalid CouchDB base URL `{url}`")]
    InvalidBaseUrl { url: String },
    /// The HTTP client could not be built.
    #[error("failed to build CouchDB HTTP client")]
    Client(#[source] reqwest::Error),
    /// The request never got a response.
    #[error("CouchDB {method} `{target}` failed")]
    Transport {
        method: Method,
        target: String,
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB answered with a status the store does not handle.
    #[error("CouchDB {method} `{target}` answered {status}")]
    Status {
        method: Method,
        target: String,
        status: StatusCode,
    },
    /// The response body was not the expected JSON.
    #[error("unexpected CouchDB payload for `{target}`")]
    Payload {
        target: String,
        #[source]
        source: reqwest::Error,
    },
    /// A row of a range scan is not a valid document.
    #[error("malformed CouchDB document in `{target}`")]
    Document {
        target: String,
        #[source]
        source: serde_json::Error,
    },
}

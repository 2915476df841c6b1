use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed backend-specific cause of a storage failure.
pub type BackendError = Box<dyn Error + Send + Sync>;

/// Backend-agnostic storage failure. Backend errors (file, MongoDB, CouchDB) convert into it.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not serve the request.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human readable summary of the failure.
        message: String,
        /// Backend-specific cause.
        #[source]
        source: BackendError,
    },
    /// The backend refused the operation outright, e.g. the memory store with failure injection.
    #[error("storage rejected operation: {0}")]
    Rejected(String),
}

impl StorageError {
    /// Wrap a backend failure, keeping its rendered message as the summary.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}

mod config;
mod error;
mod store;

pub use config::FileConfig;
pub use error::FileStoreError;
pub use store::FileStore;

use crate::dao::storage::StorageError;

impl From<FileStoreError> for StorageError {
    fn from(err: FileStoreError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}

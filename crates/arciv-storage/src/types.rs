use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object store error: {0}")]
    ObjectStore(object_store::Error),

    #[error("Unsupported by this backend: {0}")]
    Unsupported(&'static str),

    #[error("Thaw request for {key} failed: {reason}")]
    Thaw { key: String, reason: String },

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl StorageError {
    /// Whether this error means the requested record or object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

impl From<object_store::Error> for StorageError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => StorageError::NotFound(path),
            other => StorageError::ObjectStore(other),
        }
    }
}

/// Map an I/O error on `key` to `NotFound` when the file is missing.
pub(crate) fn not_found_or_io(key: &str) -> impl FnOnce(io::Error) -> StorageError + '_ {
    move |e| {
        if e.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound(key.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

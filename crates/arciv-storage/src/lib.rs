//! Storage backends for arciv repositories.
//!
//! Every repository, local or remote, uses the same key layout under its root:
//!
//! ```text
//! .arciv/
//!   timeline            newline list of commit ids
//!   list/<commit-id>    atom or extension record
//!   blob/<64-hex>       content-addressed file contents
//! ```
//!
//! A [`Backend`] stores text records and whole-file blobs under those keys.
//! The filesystem backend writes into a directory; the object backend talks to
//! an [`object_store`] implementation (S3 in practice, in-memory in tests).

use std::path::Path;

mod fs;
mod object;
mod types;

pub use fs::FsBackend;
pub use object::{ObjectBackend, S3Thaw, Thaw};
pub use types::StorageError;

/// Name of the control directory at the root of every repository.
pub const CONTROL_DIR: &str = ".arciv";

/// Key of the timeline record.
pub const TIMELINE_KEY: &str = ".arciv/timeline";

/// Key prefix of the commit list records.
pub const LIST_PREFIX: &str = ".arciv/list";

/// Key prefix of the blob namespace.
pub const BLOB_PREFIX: &str = ".arciv/blob";

/// Key of the commit record for `commit_id`.
pub fn list_key(commit_id: &str) -> String {
    format!("{LIST_PREFIX}/{commit_id}")
}

/// Key of the blob with the given hex hash.
pub fn blob_key(hash_hex: &str) -> String {
    format!("{BLOB_PREFIX}/{hash_hex}")
}

/// The capability set shared by all repository locations.
///
/// All calls are blocking. Keys are `/`-separated and relative to the
/// repository root.
pub trait Backend {
    /// Ensure the directory structure and the timeline record exist.
    ///
    /// Never truncates records that are already present.
    fn init(&self) -> Result<(), StorageError>;

    /// Read a text record line by line.
    ///
    /// Returns [`StorageError::NotFound`] if the record does not exist.
    fn load_lines(&self, key: &str) -> Result<Vec<String>, StorageError>;

    /// Replace a text record with `lines`, one per line.
    fn write_lines(&self, key: &str, lines: &[String]) -> Result<(), StorageError>;

    /// List the names of the objects directly under `prefix`.
    ///
    /// Names are relative to the prefix. A missing prefix lists as empty.
    /// Partially written objects may show up here; callers filter names.
    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Upload the local file at `from` to `key`.
    fn put_file(&self, from: &Path, key: &str) -> Result<(), StorageError>;

    /// Download `key` to the local path `to`, creating parent directories.
    fn get_file(&self, key: &str, to: &Path) -> Result<(), StorageError>;

    /// Ask the backend to thaw an archived object so it can be downloaded
    /// later. The object stays readable for `valid_days` once thawed.
    fn request_thaw(&self, key: &str, valid_days: u32) -> Result<(), StorageError> {
        let _ = (key, valid_days);
        Err(StorageError::Unsupported("thaw requests"))
    }
}

use std::io;
use std::path::PathBuf;

use arciv_storage::StorageError;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Time error: {0}")]
    Time(#[from] jiff::Error),

    // --- Validation and parsing ---
    #[error("Invalid tag line {line:?}: {reason}")]
    TagLine { line: String, reason: &'static str },

    #[error("Invalid hex digest {0:?}")]
    Digest(String),

    #[error("Commit id must be 73 characters long, got {0}")]
    CommitIdLength(usize),

    #[error("Invalid commit id {0:?}")]
    CommitIdFormat(String),

    #[error("Record {id} has an unknown header {header:?}")]
    UnknownRecord { id: String, header: String },

    #[error("Record {0} is empty")]
    EmptyRecord(String),

    #[error("Record {id} has a malformed line {line:?}")]
    RecordLine { id: String, line: String },

    #[error("Record {id} removes a tag its base does not have: {tag}")]
    MissingRemoval { id: String, tag: String },

    #[error("Commit chain from {0} is deeper than the maximum depth")]
    ChainTooDeep(String),

    #[error("Invalid repository descriptor {line:?}: {reason}")]
    Descriptor { line: String, reason: &'static str },

    #[error("Unsupported repository url {0:?}, expected file:///... or s3://bucket?region=...")]
    RepositoryUrl(String),

    #[error("Invalid restore request: {0}")]
    RestoreRequest(String),

    #[error("Invalid restore request id {0:?}")]
    RestoreRequestId(String),

    #[error("Unsafe tracked path {path:?}: {reason}")]
    UnsafePath { path: String, reason: &'static str },

    // --- Domain ---
    #[error("Empty commit alias")]
    EmptyAlias,

    #[error("The alias {0:?} refers to more than one commit")]
    AmbiguousAlias(String),

    #[error("Commit not found: {0}")]
    CommitNotFound(String),

    #[error("No commit has been recorded yet")]
    NoCommits,

    #[error("Same commit")]
    SameCommit,

    #[error("Local tree not saved with latest commit (use --force to discard local changes)")]
    UnsavedChanges,

    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("The repository name already exists: {0}")]
    DuplicateRepository(String),

    #[error("The repository name {0:?} is reserved")]
    ReservedRepository(String),

    #[error("Repository names must be non-empty without spaces or colons: {0:?}")]
    RepositoryName(String),

    #[error("Blob {0} is missing from the local blob cache")]
    MissingBlob(String),

    #[error("Path is not valid UTF-8: {0:?}")]
    NonUtf8Path(PathBuf),

    #[error("No .arciv directory found in {0:?} or any parent")]
    RootNotFound(PathBuf),
}

//! arciv - content-addressed snapshots of a directory tree
//!
//! This library fingerprints a tree into commits, records them in an
//! append-only timeline using delta-compressed records, and synchronises
//! deduplicated file blobs with other repositories on a filesystem or in
//! object storage, including cold storage tiers that need a thaw request
//! before blobs can be downloaded.

pub mod chain;
pub mod commit;
pub mod diff;
pub mod digest;
pub mod error;
pub mod repository;
pub mod restore_request;
pub mod snapshot;
pub mod sync;
pub mod tag;
pub mod workspace;

pub use chain::{AddOutcome, Record};
pub use commit::{COMMIT_ID_LEN, Commit, CommitId, MAX_DEPTH, resolve_alias};
pub use diff::{Change, Delta, TagDiff, classify, diff, diff_hashes};
pub use digest::Digest;
pub use error::{Error, Result};
pub use repository::{Location, Registry, Remote, Repository, SELF_NAME, Store};
pub use restore_request::RestoreRequest;
pub use snapshot::take_snapshot;
pub use tag::{Fields, Tag, find_index};
pub use workspace::Workspace;

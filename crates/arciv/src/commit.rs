//! Commits and commit ids.

use std::fmt;
use std::str::FromStr;

use crate::digest::Digest;
use crate::error::{Error, Result};
use crate::tag::Tag;

/// Length of a commit id: 8 hex timestamp digits, a dash, 64 hex hash digits.
pub const COMMIT_ID_LEN: usize = 8 + 1 + Digest::HEX_LEN;

/// Longest run of extension records allowed above an atom.
pub const MAX_DEPTH: usize = 9;

/// `<8-hex timestamp>-<64-hex hash>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommitId(String);

impl CommitId {
    /// The timestamp is clamped to the 8 hex digits the id has room for.
    pub fn new(timestamp: i64, hash: &Digest) -> Self {
        let timestamp = timestamp.clamp(0, u32::MAX as i64);
        Self(format!("{timestamp:08x}-{hash}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn timestamp(&self) -> i64 {
        i64::from_str_radix(&self.0[..8], 16).unwrap_or_default()
    }

    pub fn hash(&self) -> Digest {
        self.0[9..].parse().unwrap_or_default()
    }

    /// The hash part of the id, in hex.
    pub fn hash_hex(&self) -> &str {
        &self.0[9..]
    }
}

impl FromStr for CommitId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != COMMIT_ID_LEN {
            return Err(Error::CommitIdLength(s.len()));
        }
        let format = || Error::CommitIdFormat(s.to_string());
        let (Some(timestamp), Some("-"), Some(hash)) = (s.get(..8), s.get(8..9), s.get(9..))
        else {
            return Err(format());
        };
        if !timestamp.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(format());
        }
        hash.parse::<Digest>().map_err(|_| format())?;
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CommitId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A snapshot of a tree: canonically sorted tags plus their derived identity.
#[derive(Debug, Clone)]
pub struct Commit {
    pub id: CommitId,
    pub timestamp: i64,
    pub hash: Digest,
    pub tags: Vec<Tag>,
    /// Extension links between this commit and its atom.
    pub depth: usize,
}

impl Commit {
    /// Build a commit from tags in any order. Duplicate tags are dropped.
    pub fn new(mut tags: Vec<Tag>, timestamp: i64) -> Self {
        tags.sort();
        tags.dedup();
        let hash = commit_hash(&tags);
        let id = CommitId::new(timestamp, &hash);
        Self {
            timestamp: id.timestamp(),
            id,
            hash,
            tags,
            depth: 0,
        }
    }

    /// A commit loaded back from a repository record.
    pub fn loaded(id: CommitId, tags: Vec<Tag>, depth: usize) -> Self {
        Self {
            timestamp: id.timestamp(),
            hash: id.hash(),
            id,
            tags,
            depth,
        }
    }

    pub fn hashes(&self) -> Vec<Digest> {
        let mut hashes: Vec<Digest> = self.tags.iter().map(|tag| tag.hash).collect();
        hashes.sort();
        hashes.dedup();
        hashes
    }
}

/// BLAKE3 over each tag line followed by a newline. `tags` must be sorted.
pub fn commit_hash(tags: &[Tag]) -> Digest {
    let mut hasher = blake3::Hasher::new();
    for tag in tags {
        hasher.update(tag.to_string().as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize().into()
}

/// Find the single commit whose id, or whose hash part, starts with `alias`.
pub fn resolve_alias<'a>(alias: &str, ids: &'a [CommitId]) -> Result<&'a CommitId> {
    if alias.is_empty() {
        return Err(Error::EmptyAlias);
    }

    let mut matches = ids
        .iter()
        .filter(|id| id.as_str().starts_with(alias) || id.hash_hex().starts_with(alias));
    let first = matches
        .next()
        .ok_or_else(|| Error::CommitNotFound(alias.to_string()))?;
    if matches.any(|other| other != first) {
        return Err(Error::AmbiguousAlias(alias.to_string()));
    }
    Ok(first)
}

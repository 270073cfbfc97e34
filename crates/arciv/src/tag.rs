//! File fingerprints.
//!
//! A [`Tag`] records one tracked file as `(hash, mtime, path)`. Tags order by
//! hash, then timestamp, then path; that single order is used for sorting,
//! diffing, and matching everywhere in the crate.

use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::ops::BitOr;
use std::path::Path;
use std::str::FromStr;

use arciv_storage::CONTROL_DIR;
use jiff::Timestamp;

use crate::digest::Digest;
use crate::error::{Error, Result};

// 64 hash + 1 space + 8 timestamp + 1 space
const PATH_OFFSET: usize = Digest::HEX_LEN + 1 + 8 + 1;

/// Fingerprint of one tracked file.
///
/// Only `hash`, `timestamp` and `path` take part in ordering, equality and
/// serialization; the `used_*` flags describe how the tag was produced.
#[derive(Debug, Clone)]
pub struct Tag {
    pub path: String,
    pub hash: Digest,
    /// Modification time in whole seconds since the epoch.
    pub timestamp: i64,
    /// False when the hash was not computed from the file during this scan.
    pub used_hash: bool,
    /// True when the timestamp was read from the filesystem.
    pub used_timestamp: bool,
}

impl Tag {
    pub fn new(path: impl Into<String>, hash: Digest, timestamp: i64) -> Self {
        Self {
            path: path.into(),
            hash,
            timestamp,
            used_hash: true,
            used_timestamp: false,
        }
    }

    /// Fingerprint the file at `root/relative_path`.
    ///
    /// The contents are only read when `with_hashing` is set; otherwise the
    /// hash is left zeroed and `used_hash` is false.
    pub fn scan(root: &Path, relative_path: &str, with_hashing: bool) -> Result<Self> {
        let path = root.join(relative_path);
        let timestamp = modified_seconds(&path)?;
        let hash = if with_hashing {
            Digest::of_file(&path)?
        } else {
            Digest::default()
        };

        Ok(Self {
            path: relative_path.to_string(),
            hash,
            timestamp,
            used_hash: with_hashing,
            used_timestamp: true,
        })
    }

    fn key(&self) -> (&Digest, i64, &str) {
        (&self.hash, self.timestamp, &self.path)
    }
}

/// Check that `path` names a file inside the tree: `/`-separated, relative,
/// without `.` or `..` components, outside the control directory, and free of
/// line breaks so it fits on one record line.
pub fn check_path(path: &str) -> Result<()> {
    let unsafe_path = |reason| {
        Err(Error::UnsafePath {
            path: path.to_string(),
            reason,
        })
    };

    if path.contains(['\n', '\r']) {
        return unsafe_path("contains a line break");
    }
    if path.starts_with('/') {
        return unsafe_path("is absolute");
    }
    for (i, part) in path.split('/').enumerate() {
        match part {
            "" => return unsafe_path("has an empty component"),
            "." | ".." => return unsafe_path("has a relative component"),
            CONTROL_DIR if i == 0 => return unsafe_path("is inside the control directory"),
            _ => {}
        }
    }
    Ok(())
}

/// Read a file's modification time in whole seconds, clamped to the range the
/// 8-hex-digit serialization can hold.
pub fn modified_seconds(path: &Path) -> Result<i64> {
    let modified = fs::metadata(path)?.modified()?;
    let seconds = Timestamp::try_from(modified)?.as_second();
    Ok(seconds.clamp(0, u32::MAX as i64))
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Tag {}

impl PartialOrd for Tag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:08x} {}", self.hash, self.timestamp, self.path)
    }
}

impl FromStr for Tag {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let invalid = |reason| Error::TagLine {
            line: line.to_string(),
            reason,
        };

        if line.len() <= PATH_OFFSET {
            return Err(invalid("line must be longer than 74 characters"));
        }
        let (Some(hash), Some(timestamp), Some(path)) = (
            line.get(..Digest::HEX_LEN),
            line.get(Digest::HEX_LEN + 1..PATH_OFFSET - 1),
            line.get(PATH_OFFSET..),
        ) else {
            return Err(invalid("fields are not at their fixed offsets"));
        };
        if &line[Digest::HEX_LEN..Digest::HEX_LEN + 1] != " "
            || &line[PATH_OFFSET - 1..PATH_OFFSET] != " "
        {
            return Err(invalid("fields must be separated by single spaces"));
        }

        let hash = hash.parse().map_err(|_| invalid("hash is not 64 hex digits"))?;
        if !timestamp.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid("timestamp is not 8 hex digits"));
        }
        let timestamp =
            i64::from_str_radix(timestamp, 16).map_err(|_| invalid("timestamp is not 8 hex digits"))?;
        check_path(path)?;

        Ok(Self::new(path, hash, timestamp))
    }
}

/// Selects which fields [`find_index`] compares.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fields(u8);

impl Fields {
    pub const HASH: Fields = Fields(0b001);
    pub const TIMESTAMP: Fields = Fields(0b010);
    pub const PATH: Fields = Fields(0b100);

    pub fn contains(self, other: Fields) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Fields {
    type Output = Fields;

    fn bitor(self, rhs: Fields) -> Fields {
        Fields(self.0 | rhs.0)
    }
}

/// Index of the first tag that matches `probe` on every selected field.
pub fn find_index(tags: &[Tag], probe: &Tag, fields: Fields) -> Option<usize> {
    tags.iter().position(|tag| {
        (!fields.contains(Fields::HASH) || tag.hash == probe.hash)
            && (!fields.contains(Fields::TIMESTAMP) || tag.timestamp == probe.timestamp)
            && (!fields.contains(Fields::PATH) || tag.path == probe.path)
    })
}

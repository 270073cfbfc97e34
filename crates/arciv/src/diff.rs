//! Sorted-merge comparison of tag sets.
//!
//! [`diff`] walks two canonically sorted sequences in lockstep and reports
//! what is only on either side. [`classify`] then pairs deletions with
//! additions to describe the change the way a person would read it.

use std::cmp::Ordering;
use std::fmt;

use crate::digest::Digest;
use crate::tag::Tag;

/// Entries only in `before` and entries only in `after`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta<T> {
    pub deleted: Vec<T>,
    pub added: Vec<T>,
}

impl<T> Delta<T> {
    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.added.is_empty()
    }
}

/// Merge two sorted slices. Runs in O(n + m).
pub fn merge<T: Ord + Clone>(before: &[T], after: &[T]) -> Delta<T> {
    let mut deleted = Vec::new();
    let mut added = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < before.len() && j < after.len() {
        match before[i].cmp(&after[j]) {
            Ordering::Equal => {
                i += 1;
                j += 1;
            }
            Ordering::Less => {
                deleted.push(before[i].clone());
                i += 1;
            }
            Ordering::Greater => {
                added.push(after[j].clone());
                j += 1;
            }
        }
    }
    deleted.extend_from_slice(&before[i..]);
    added.extend_from_slice(&after[j..]);

    Delta { deleted, added }
}

pub type TagDiff = Delta<Tag>;

pub fn diff(before: &[Tag], after: &[Tag]) -> TagDiff {
    merge(before, after)
}

/// Blob-level diff over sorted hash lists.
pub fn diff_hashes(before: &[Digest], after: &[Digest]) -> Delta<Digest> {
    merge(before, after)
}

/// A single human-readable change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Same contents and path, new modification time.
    Update { from: Tag, to: Tag },
    Rename { from: Tag, to: Tag },
    Rewrite { from: Tag, to: Tag },
    Deletion(Tag),
    Addition(Tag),
}

/// Pair deletions with additions.
///
/// For each deleted tag the first added tag with the same hash and path makes
/// an update; failing that, the same hash makes a rename; failing that, the
/// same path makes a rewrite. A matched addition is not reused. Unpaired
/// entries are deletions and additions.
pub fn classify(delta: &TagDiff) -> Vec<Change> {
    let mut pool: Vec<Option<&Tag>> = delta.added.iter().map(Some).collect();

    let mut changes = Vec::new();
    for from in &delta.deleted {
        let change = if let Some(to) =
            take_match(&mut pool, |t| t.hash == from.hash && t.path == from.path)
        {
            Change::Update {
                from: from.clone(),
                to,
            }
        } else if let Some(to) = take_match(&mut pool, |t| t.hash == from.hash) {
            Change::Rename {
                from: from.clone(),
                to,
            }
        } else if let Some(to) = take_match(&mut pool, |t| t.path == from.path) {
            Change::Rewrite {
                from: from.clone(),
                to,
            }
        } else {
            Change::Deletion(from.clone())
        };
        changes.push(change);
    }

    changes.extend(pool.into_iter().flatten().cloned().map(Change::Addition));
    changes
}

fn take_match(pool: &mut [Option<&Tag>], matches: impl Fn(&Tag) -> bool) -> Option<Tag> {
    let slot = pool
        .iter_mut()
        .find(|slot| slot.is_some_and(|tag| matches(tag)))?;
    slot.take().cloned()
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Update { to, .. } => write!(f, "update   {}", to.path),
            Change::Rename { from, to } => write!(f, "rename   {} -> {}", from.path, to.path),
            Change::Rewrite { to, .. } => write!(f, "rewrite  {}", to.path),
            Change::Deletion(tag) => write!(f, "delete   {}", tag.path),
            Change::Addition(tag) => write!(f, "add      {}", tag.path),
        }
    }
}

//! Commit records and the timeline.
//!
//! A commit is stored either as an atom (its full tag list) or as an extension
//! (tags removed from and added to a base commit). Extensions chain at most
//! [`MAX_DEPTH`] deep before the next commit is written as an atom again.

use std::collections::BTreeSet;

use arciv_storage::{Backend, TIMELINE_KEY, list_key};
use tracing::{debug, info};

use crate::commit::{Commit, CommitId, MAX_DEPTH};
use crate::diff::diff;
use crate::error::{Error, Result};
use crate::tag::Tag;

const ATOM_HEADER: &str = "#arciv-commit-atom";
const EXTENSION_HEADER: &str = "#arciv-commit-extension";

/// One stored commit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Atom(Vec<Tag>),
    Extension {
        base: CommitId,
        removed: Vec<Tag>,
        added: Vec<Tag>,
    },
}

impl Record {
    pub fn to_lines(&self) -> Vec<String> {
        match self {
            Record::Atom(tags) => std::iter::once(ATOM_HEADER.to_string())
                .chain(tags.iter().map(Tag::to_string))
                .collect(),
            Record::Extension {
                base,
                removed,
                added,
            } => std::iter::once(format!("{EXTENSION_HEADER} from:{base}"))
                .chain(removed.iter().map(|tag| format!("- {tag}")))
                .chain(added.iter().map(|tag| format!("+ {tag}")))
                .collect(),
        }
    }

    /// Parse the record stored for `id`.
    pub fn parse(id: &CommitId, lines: &[String]) -> Result<Self> {
        let Some((header, body)) = lines.split_first() else {
            return Err(Error::EmptyRecord(id.to_string()));
        };
        let bad_line = |line: &str| Error::RecordLine {
            id: id.to_string(),
            line: line.to_string(),
        };

        if header == ATOM_HEADER {
            let tags = body
                .iter()
                .map(|line| line.parse())
                .collect::<Result<Vec<Tag>>>()?;
            return Ok(Record::Atom(tags));
        }

        let base = header
            .strip_prefix(EXTENSION_HEADER)
            .and_then(|rest| rest.strip_prefix(" from:"))
            .ok_or_else(|| Error::UnknownRecord {
                id: id.to_string(),
                header: header.clone(),
            })?
            .parse()?;

        let mut removed = Vec::new();
        let mut added = Vec::new();
        for line in body {
            if let Some(tag) = line.strip_prefix("- ") {
                removed.push(tag.parse()?);
            } else if let Some(tag) = line.strip_prefix("+ ") {
                added.push(tag.parse()?);
            } else {
                return Err(bad_line(line));
            }
        }

        Ok(Record::Extension {
            base,
            removed,
            added,
        })
    }
}

/// Load the timeline, oldest commit first. A missing timeline is empty.
pub fn load_timeline<B: Backend + ?Sized>(backend: &B) -> Result<Vec<CommitId>> {
    let lines = match backend.load_lines(TIMELINE_KEY) {
        Ok(lines) => lines,
        Err(err) if err.is_not_found() => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    lines
        .iter()
        .filter(|line| !line.is_empty())
        .map(|line| line.parse())
        .collect()
}

/// Reconstruct a commit by replaying its extension chain over its atom.
pub fn load_commit<B: Backend + ?Sized>(backend: &B, id: &CommitId) -> Result<Commit> {
    let mut chain = Vec::new();
    let mut current = id.clone();

    let atom = loop {
        let lines = backend.load_lines(&list_key(current.as_str()))?;
        match Record::parse(&current, &lines)? {
            Record::Atom(tags) => break tags,
            Record::Extension {
                base,
                removed,
                added,
            } => {
                if chain.len() == MAX_DEPTH {
                    return Err(Error::ChainTooDeep(id.to_string()));
                }
                chain.push((current, removed, added));
                current = base;
            }
        }
    };

    let depth = chain.len();
    let mut tags: BTreeSet<Tag> = atom.into_iter().collect();
    for (record_id, removed, added) in chain.into_iter().rev() {
        for tag in removed {
            if !tags.remove(&tag) {
                return Err(Error::MissingRemoval {
                    id: record_id.to_string(),
                    tag: tag.to_string(),
                });
            }
        }
        tags.extend(added);
    }

    debug!(%id, depth, tags = tags.len(), "Loaded commit");
    Ok(Commit::loaded(id.clone(), tags.into_iter().collect(), depth))
}

/// What [`add_commit`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The commit id was already in the timeline.
    AlreadyPresent,
    /// The newest commit has the same tag hash.
    Unchanged,
    /// The commit was written with this chain depth and appended.
    Appended { depth: usize },
}

/// Record `commit` and append it to the timeline.
pub fn add_commit<B: Backend + ?Sized>(backend: &B, commit: &Commit) -> Result<AddOutcome> {
    let mut timeline = load_timeline(backend)?;
    if timeline.contains(&commit.id) {
        debug!(id = %commit.id, "Commit already recorded");
        return Ok(AddOutcome::AlreadyPresent);
    }

    let base = match timeline.last() {
        Some(latest) if latest.hash() == commit.hash => {
            debug!(id = %commit.id, %latest, "Tree unchanged since latest commit");
            return Ok(AddOutcome::Unchanged);
        }
        Some(latest) => Some(load_commit(backend, latest)?).filter(|base| base.depth < MAX_DEPTH),
        None => None,
    };

    let (record, depth) = match base {
        Some(base) => {
            let delta = diff(&base.tags, &commit.tags);
            let record = Record::Extension {
                base: base.id,
                removed: delta.deleted,
                added: delta.added,
            };
            (record, base.depth + 1)
        }
        None => (Record::Atom(commit.tags.clone()), 0),
    };

    backend.write_lines(&list_key(commit.id.as_str()), &record.to_lines())?;
    timeline.push(commit.id.clone());
    let lines: Vec<String> = timeline.iter().map(CommitId::to_string).collect();
    backend.write_lines(TIMELINE_KEY, &lines)?;

    info!(id = %commit.id, depth, "Recorded commit");
    Ok(AddOutcome::Appended { depth })
}

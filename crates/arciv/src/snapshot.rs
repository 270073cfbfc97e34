//! Building commits from the working tree.

use std::collections::HashMap;
use std::path::Path;

use jiff::Timestamp;
use tracing::{debug, info};
use walkdir::WalkDir;

use arciv_storage::CONTROL_DIR;

use crate::commit::Commit;
use crate::digest::Digest;
use crate::error::{Error, Result};
use crate::tag::{Tag, check_path};
use crate::workspace::Workspace;

/// Relative `/`-separated paths of every regular file in the tree, outside the
/// control directory.
pub fn list_files(workspace: &Workspace) -> Result<Vec<String>> {
    let root = workspace.root();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() != 1 || entry.file_name() != CONTROL_DIR);

    let mut paths = Vec::new();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        paths.push(relative_path(root, entry.path())?);
    }
    Ok(paths)
}

fn relative_path(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let parts = relative
        .components()
        .map(|part| {
            part.as_os_str()
                .to_str()
                .ok_or_else(|| Error::NonUtf8Path(path.to_path_buf()))
        })
        .collect::<Result<Vec<_>>>()?;
    let joined = parts.join("/");
    check_path(&joined)?;
    Ok(joined)
}

/// Tag every file in the tree and build a provisional commit stamped with the
/// current time.
///
/// With `fast` set to a previous commit, files whose path and mtime match a tag
/// of that commit reuse its hash instead of being read. This trusts mtime to
/// detect content changes.
pub fn take_snapshot(workspace: &Workspace, fast: Option<&Commit>) -> Result<Commit> {
    take_snapshot_at(workspace, fast, Timestamp::now().as_second())
}

pub fn take_snapshot_at(
    workspace: &Workspace,
    fast: Option<&Commit>,
    timestamp: i64,
) -> Result<Commit> {
    let known: HashMap<(&str, i64), Digest> = fast
        .map(|commit| {
            commit
                .tags
                .iter()
                .map(|tag| ((tag.path.as_str(), tag.timestamp), tag.hash))
                .collect()
        })
        .unwrap_or_default();

    let paths = list_files(workspace)?;
    debug!(files = paths.len(), fast = fast.is_some(), "Scanning tree");

    let mut tags = Vec::with_capacity(paths.len());
    let mut reused = 0;
    for path in &paths {
        let mut tag = Tag::scan(workspace.root(), path, false)?;
        match known.get(&(path.as_str(), tag.timestamp)) {
            Some(hash) => {
                tag.hash = *hash;
                reused += 1;
            }
            None => {
                tag.hash = Digest::of_file(&workspace.file_path(path)?)?;
                tag.used_hash = true;
            }
        }
        tags.push(tag);
    }

    let commit = Commit::new(tags, timestamp);
    info!(id = %commit.id, files = commit.tags.len(), reused, "Built snapshot");
    Ok(commit)
}

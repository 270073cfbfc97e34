//! Moving trees between the workspace and repositories.
//!
//! Only blobs the other side lacks are transferred. Every operation can be
//! re-run after a partial failure: commits are recorded idempotently and
//! blobs are content-addressed.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::chain::AddOutcome;
use crate::commit::{Commit, CommitId};
use crate::digest::Digest;
use crate::error::{Error, Result};
use crate::repository::{Remote, Repository};
use crate::restore_request::RestoreRequest;
use crate::snapshot::take_snapshot;
use crate::tag::{Fields, Tag, find_index};
use crate::workspace::{Workspace, copy_file, move_file, remove_empty_dirs, set_modified};

/// Snapshot the tree and record it in the local timeline.
///
/// With `fast`, hashes are reused from the latest local commit for files whose
/// path and mtime did not change.
pub fn commit(workspace: &Workspace, fast: bool) -> Result<(Commit, AddOutcome)> {
    let local = Repository::local(workspace);
    let previous = if fast { local.latest()? } else { None };
    let commit = take_snapshot(workspace, previous.as_ref())?;
    let outcome = local.add_commit(&commit)?;
    Ok((commit, outcome))
}

#[derive(Debug, Clone)]
pub struct StoreReport {
    pub commit: CommitId,
    pub local: AddOutcome,
    pub remote: AddOutcome,
    pub sent: usize,
}

/// Commit the tree, then push the commit and the blobs `remote` lacks.
pub fn store(workspace: &Workspace, remote: &Repository, fast: bool) -> Result<StoreReport> {
    let (commit, local) = self::commit(workspace, fast)?;

    let remote_hashes = remote.blob_hashes()?;
    let missing: Vec<Tag> = commit
        .tags
        .iter()
        .filter(|tag| remote_hashes.binary_search(&tag.hash).is_err())
        .cloned()
        .collect();
    debug!(remote = remote.name(), missing = missing.len(), "Computed missing blobs");

    let sent = remote.send_local_blobs(workspace, &missing)?;
    let remote_outcome = remote.add_commit(&commit)?;

    info!(id = %commit.id, remote = remote.name(), sent, "Stored commit");
    Ok(StoreReport {
        commit: commit.id,
        local,
        remote: remote_outcome,
        sent,
    })
}

/// Refuse to overwrite a tree that differs from the latest local commit.
/// An empty tree without any commit counts as saved.
pub fn check_saved(workspace: &Workspace, current: &Commit) -> Result<()> {
    let timeline = Repository::local(workspace).timeline()?;
    let saved = match timeline.last() {
        Some(latest) => latest.hash() == current.hash,
        None => current.tags.is_empty(),
    };
    if saved {
        Ok(())
    } else {
        Err(Error::UnsavedChanges)
    }
}

/// Hashes of `target` found neither in the current tree nor in the blob cache.
pub fn missing_blobs(workspace: &Workspace, current: &Commit, target: &Commit) -> Result<Vec<Digest>> {
    let mut present: BTreeSet<Digest> = current.tags.iter().map(|tag| tag.hash).collect();
    present.extend(workspace.cached_blobs()?);
    Ok(target
        .hashes()
        .into_iter()
        .filter(|hash| !present.contains(hash))
        .collect())
}

/// Move every tracked file into the blob cache, then drop empty directories.
pub fn stash(workspace: &Workspace, tags: &[Tag]) -> Result<usize> {
    for tag in tags {
        move_file(&workspace.file_path(&tag.path)?, &workspace.blob_path(&tag.hash))?;
    }
    let dirs = remove_empty_dirs(workspace)?;
    info!(files = tags.len(), dirs, "Stashed tree");
    Ok(tags.len())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnstashReport {
    pub copied: usize,
    pub moved: usize,
}

/// Place the files of `tags` from the blob cache into the tree.
///
/// A blob still needed by a later tag is copied, the last user moves it.
/// Files get their recorded mtime back. Fails before touching anything if a
/// blob is missing.
pub fn unstash(workspace: &Workspace, tags: &[Tag]) -> Result<UnstashReport> {
    if let Some(tag) = tags.iter().find(|tag| !workspace.has_blob(&tag.hash)) {
        return Err(Error::MissingBlob(tag.hash.to_string()));
    }

    let mut report = UnstashReport::default();
    for (i, tag) in tags.iter().enumerate() {
        let from = workspace.blob_path(&tag.hash);
        let to = workspace.file_path(&tag.path)?;
        if find_index(&tags[i + 1..], tag, Fields::HASH).is_some() {
            copy_file(&from, &to)?;
            report.copied += 1;
        } else {
            move_file(&from, &to)?;
            report.moved += 1;
        }
        set_modified(&to, tag.timestamp)?;
    }

    info!(copied = report.copied, moved = report.moved, "Unstashed tree");
    Ok(report)
}

/// What a restore will do.
#[derive(Debug, Clone)]
pub struct RestorePlan {
    pub current: Commit,
    pub target: Commit,
    /// Blobs to download before the tree is swapped.
    pub download: Vec<Digest>,
}

#[derive(Debug, Clone)]
pub struct RestoreReport {
    pub commit: CommitId,
    pub downloaded: usize,
    pub unstash: UnstashReport,
    pub outcome: AddOutcome,
}

/// Resolve `alias` on `remote` and work out what restoring it needs.
///
/// Unless `force` is set, the tree must match the latest local commit.
pub fn plan_restore(
    workspace: &Workspace,
    remote: &Repository,
    alias: &str,
    force: bool,
) -> Result<RestorePlan> {
    let target = remote.load_commit_from_alias(alias)?;
    let current = take_snapshot(workspace, None)?;
    if force {
        warn!("Skipping the saved-tree check");
    } else {
        check_saved(workspace, &current)?;
    }
    let download = missing_blobs(workspace, &current, &target)?;
    debug!(target = %target.id, download = download.len(), "Planned restore");

    Ok(RestorePlan {
        current,
        target,
        download,
    })
}

/// Download the missing blobs and swap the tree to the plan's target.
pub fn execute_restore(
    workspace: &Workspace,
    remote: &Repository,
    plan: &RestorePlan,
) -> Result<RestoreReport> {
    let downloaded = remote.receive_remote_blobs(workspace, &plan.download)?;
    let (unstash, outcome) = place(workspace, &plan.current, &plan.target)?;
    Ok(RestoreReport {
        commit: plan.target.id.clone(),
        downloaded,
        unstash,
        outcome,
    })
}

/// Restore the commit `alias` of `remote` into the workspace.
pub fn restore(
    workspace: &Workspace,
    remote: &Repository,
    alias: &str,
    force: bool,
) -> Result<RestoreReport> {
    let plan = plan_restore(workspace, remote, alias, force)?;
    execute_restore(workspace, remote, &plan)
}

/// Swap the tree from `current` to `target` and record `target` locally.
fn place(
    workspace: &Workspace,
    current: &Commit,
    target: &Commit,
) -> Result<(UnstashReport, AddOutcome)> {
    if let Some(hash) = missing_blobs(workspace, current, target)?.first() {
        return Err(Error::MissingBlob(hash.to_string()));
    }
    stash(workspace, &current.tags)?;
    let report = unstash(workspace, &target.tags)?;
    let outcome = Repository::local(workspace).add_commit(target)?;
    info!(id = %target.id, ?outcome, "Restored commit");
    Ok((report, outcome))
}

/// Ask `remote` to thaw the blobs needed to restore `alias`, and persist the
/// request.
///
/// When a thaw request fails, the ones already accepted are still persisted
/// before the error is returned.
pub fn request_restore(
    workspace: &Workspace,
    remote: &Repository,
    alias: &str,
    valid_days: u32,
) -> Result<(String, RestoreRequest)> {
    let target = remote.load_commit_from_alias(alias)?;
    let current = take_snapshot(workspace, None)?;
    let missing = missing_blobs(workspace, &current, &target)?;

    let mut accepted = Vec::with_capacity(missing.len());
    let mut failure = None;
    for hash in missing {
        match remote.request_thaw(&hash, valid_days) {
            Ok(()) => accepted.push(hash),
            Err(err) => {
                failure = Some(err);
                break;
            }
        }
    }

    let request = RestoreRequest {
        remote: remote.remote(),
        valid_days,
        commit: target.id,
        blobs: accepted,
    };
    let id = request.save(workspace)?;

    if let Some(err) = failure {
        warn!(%id, accepted = request.blobs.len(), %err, "Thaw request failed part way");
        return Err(err);
    }
    info!(%id, blobs = request.blobs.len(), valid_days, "Requested restore");
    Ok((id, request))
}

/// Complete a pending restore once its blobs have thawed.
///
/// `open` turns the recorded remote into a repository. The request is removed
/// only after the tree has been restored, so a failed attempt can be retried.
pub fn consume_restore_request<F>(
    workspace: &Workspace,
    id: &str,
    force: bool,
    open: F,
) -> Result<RestoreReport>
where
    F: FnOnce(&Remote) -> Result<Repository>,
{
    let request = RestoreRequest::load(workspace, id)?;
    let remote = open(&request.remote)?;
    let target = remote.load_commit(&request.commit)?;

    let current = take_snapshot(workspace, None)?;
    if force {
        warn!("Skipping the saved-tree check");
    } else {
        check_saved(workspace, &current)?;
    }

    let download: Vec<Digest> = request
        .blobs
        .iter()
        .filter(|hash| !workspace.has_blob(hash))
        .copied()
        .collect();
    let downloaded = remote.receive_remote_blobs(workspace, &download)?;
    let (unstash, outcome) = place(workspace, &current, &target)?;

    RestoreRequest::remove(workspace, id)?;
    info!(%id, commit = %target.id, "Consumed restore request");
    Ok(RestoreReport {
        commit: target.id,
        downloaded,
        unstash,
        outcome,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::snapshot::list_files;

    fn workspace() -> (tempfile::TempDir, Workspace) {
        let dir = tempfile::TempDir::new().unwrap();
        let workspace = Workspace::init(dir.path()).unwrap();
        (dir, workspace)
    }

    #[test]
    fn shared_blob_is_copied_once_and_moved_once() {
        let (_dir, workspace) = workspace();
        let hash = Digest::hash(b"shared");
        fs::write(workspace.blob_path(&hash), b"shared").unwrap();

        let tags = vec![Tag::new("one.txt", hash, 100), Tag::new("dir/two.txt", hash, 200)];
        let report = unstash(&workspace, &tags).unwrap();

        assert_eq!(report, UnstashReport { copied: 1, moved: 1 });
        assert_eq!(fs::read(workspace.file_path("one.txt").unwrap()).unwrap(), b"shared");
        assert_eq!(fs::read(workspace.file_path("dir/two.txt").unwrap()).unwrap(), b"shared");
        assert!(workspace.cached_blobs().unwrap().is_empty());
        assert_eq!(
            crate::tag::modified_seconds(&workspace.file_path("dir/two.txt").unwrap()).unwrap(),
            200
        );
    }

    #[test]
    fn unstash_fails_up_front_on_missing_blob() {
        let (_dir, workspace) = workspace();
        let present = Digest::hash(b"present");
        fs::write(workspace.blob_path(&present), b"present").unwrap();

        let tags = vec![
            Tag::new("a", present, 1),
            Tag::new("b", Digest::hash(b"absent"), 1),
        ];
        assert!(matches!(unstash(&workspace, &tags), Err(Error::MissingBlob(_))));
        assert!(!workspace.file_path("a").unwrap().exists());
        assert!(workspace.has_blob(&present));
    }

    #[test]
    fn stash_then_unstash_restores_tree() {
        let (dir, workspace) = workspace();
        fs::create_dir_all(dir.path().join("photos/2020")).unwrap();
        fs::write(dir.path().join("photos/2020/a.jpg"), b"a").unwrap();
        fs::write(dir.path().join("b.txt"), b"b").unwrap();

        let (commit, _) = commit(&workspace, false).unwrap();
        stash(&workspace, &commit.tags).unwrap();
        assert!(!dir.path().join("photos").exists());
        assert_eq!(workspace.cached_blobs().unwrap().len(), 2);

        unstash(&workspace, &commit.tags).unwrap();
        assert_eq!(fs::read(dir.path().join("photos/2020/a.jpg")).unwrap(), b"a");
        let again = take_snapshot(&workspace, None).unwrap();
        assert_eq!(again.hash, commit.hash);
    }

    #[test]
    fn stash_tree_with_duplicate_files() {
        let (dir, workspace) = workspace();
        fs::create_dir_all(dir.path().join("x")).unwrap();
        fs::write(dir.path().join("x/one"), b"twin").unwrap();
        fs::write(dir.path().join("two"), b"twin").unwrap();

        let (commit, _) = commit(&workspace, false).unwrap();
        assert_eq!(stash(&workspace, &commit.tags).unwrap(), 2);
        assert_eq!(workspace.cached_blobs().unwrap(), vec![Digest::hash(b"twin")]);
        assert!(list_files(&workspace).unwrap().is_empty());

        let report = unstash(&workspace, &commit.tags).unwrap();
        assert_eq!(report, UnstashReport { copied: 1, moved: 1 });
        assert!(workspace.cached_blobs().unwrap().is_empty());
        assert_eq!(take_snapshot(&workspace, None).unwrap().hash, commit.hash);
    }

    #[test]
    fn read_only_files_survive_stash_and_unstash() {
        let (dir, workspace) = workspace();
        let path = dir.path().join("ro.txt");
        fs::write(&path, b"read only").unwrap();
        let mut permissions = fs::metadata(&path).unwrap().permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&path, permissions).unwrap();

        let (commit, _) = commit(&workspace, false).unwrap();
        stash(&workspace, &commit.tags).unwrap();
        unstash(&workspace, &commit.tags).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"read only");
        assert_eq!(take_snapshot(&workspace, None).unwrap().hash, commit.hash);
    }

    #[test]
    fn unstash_refuses_paths_outside_the_tree() {
        let (dir, workspace) = workspace();
        let hash = Digest::hash(b"payload");
        fs::write(workspace.blob_path(&hash), b"payload").unwrap();

        let tags = vec![Tag::new("../escaped", hash, 1)];
        assert!(matches!(
            unstash(&workspace, &tags),
            Err(Error::UnsafePath { .. })
        ));
        assert!(!dir.path().parent().unwrap().join("escaped").exists());
        assert!(workspace.has_blob(&hash));
    }

    #[test]
    fn line_break_in_name_leaves_timeline_readable() {
        let (dir, workspace) = workspace();
        fs::write(dir.path().join("ok.txt"), b"ok").unwrap();
        commit(&workspace, false).unwrap();

        fs::write(dir.path().join("bad\nname"), b"bad").unwrap();
        assert!(matches!(
            commit(&workspace, false),
            Err(Error::UnsafePath { .. })
        ));
        let local = Repository::local(&workspace);
        assert_eq!(local.timeline().unwrap().len(), 1);
        assert_eq!(local.latest().unwrap().unwrap().tags.len(), 1);

        fs::remove_file(dir.path().join("bad\nname")).unwrap();
        fs::write(dir.path().join("other.txt"), b"other").unwrap();
        let (_, outcome) = commit(&workspace, false).unwrap();
        assert_eq!(outcome, AddOutcome::Appended { depth: 1 });
    }

    #[test]
    fn empty_tree_without_commits_is_saved() {
        let (_dir, workspace) = workspace();
        let current = take_snapshot(&workspace, None).unwrap();
        check_saved(&workspace, &current).unwrap();
    }

    #[test]
    fn unsaved_tree_is_detected() {
        let (dir, workspace) = workspace();
        fs::write(dir.path().join("a"), b"a").unwrap();
        let current = take_snapshot(&workspace, None).unwrap();
        assert!(matches!(
            check_saved(&workspace, &current),
            Err(Error::UnsavedChanges)
        ));

        commit(&workspace, false).unwrap();
        check_saved(&workspace, &current).unwrap();
    }

    #[test]
    fn missing_blobs_ignore_tree_and_cache() {
        let (dir, workspace) = workspace();
        fs::write(dir.path().join("a"), b"a").unwrap();
        let cached = Digest::hash(b"cached");
        fs::write(workspace.blob_path(&cached), b"cached").unwrap();
        let current = take_snapshot(&workspace, None).unwrap();

        let remote_only = Digest::hash(b"remote");
        let target = Commit::new(
            vec![
                Tag::new("a", Digest::hash(b"a"), 1),
                Tag::new("c", cached, 1),
                Tag::new("r1", remote_only, 1),
                Tag::new("r2", remote_only, 2),
            ],
            5,
        );
        assert_eq!(
            missing_blobs(&workspace, &current, &target).unwrap(),
            vec![remote_only]
        );
    }
}

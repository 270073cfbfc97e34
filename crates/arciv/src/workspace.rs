//! The local working tree and its control directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use arciv_storage::{Backend, CONTROL_DIR, FsBackend, blob_key};
use jiff::Timestamp;
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::digest::Digest;
use crate::error::{Error, Result};
use crate::tag::check_path;

/// A directory tracked by arciv: the tree plus its `.arciv` control directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Find the nearest ancestor of `start` (inclusive) that has a control
    /// directory.
    pub fn discover(start: &Path) -> Result<Self> {
        start
            .ancestors()
            .find(|dir| dir.join(CONTROL_DIR).is_dir())
            .map(Self::new)
            .ok_or_else(|| Error::RootNotFound(start.to_path_buf()))
    }

    /// Create the control directory in `root`. Existing records are kept.
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let workspace = Self::new(root);
        FsBackend::new(&workspace.root).init()?;

        let repositories = workspace.repositories_path();
        if !repositories.exists() {
            fs::write(&repositories, b"")?;
        }
        fs::create_dir_all(workspace.restore_request_dir())?;

        debug!(root = ?workspace.root, "Initialised workspace");
        Ok(workspace)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn control_dir(&self) -> PathBuf {
        self.root.join(CONTROL_DIR)
    }

    pub fn repositories_path(&self) -> PathBuf {
        self.control_dir().join("repositories")
    }

    pub fn restore_request_dir(&self) -> PathBuf {
        self.control_dir().join("restore-request")
    }

    /// Path of a tracked file. Paths that would leave the tree or reach into
    /// the control directory are refused.
    pub fn file_path(&self, relative_path: &str) -> Result<PathBuf> {
        check_path(relative_path)?;
        Ok(relative_path
            .split('/')
            .fold(self.root.clone(), |path, part| path.join(part)))
    }

    /// Path of a blob in the local cache.
    pub fn blob_path(&self, hash: &Digest) -> PathBuf {
        blob_key(&hash.as_hex())
            .split('/')
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    pub fn has_blob(&self, hash: &Digest) -> bool {
        self.blob_path(hash).is_file()
    }

    /// Hashes of the blobs currently in the local cache.
    pub fn cached_blobs(&self) -> Result<Vec<Digest>> {
        let names = FsBackend::new(&self.root).list_keys(arciv_storage::BLOB_PREFIX)?;
        let mut hashes = names
            .iter()
            .filter(|name| Digest::is_hex_name(name))
            .map(|name| name.parse())
            .collect::<Result<Vec<Digest>>>()?;
        hashes.sort();
        Ok(hashes)
    }
}

/// Copy a file, creating the target's parent directories.
pub fn copy_file(from: &Path, to: &Path) -> Result<()> {
    create_parent(to)?;
    fs::copy(from, to)?;
    trace!(?from, ?to, "Copied");
    Ok(())
}

/// Move a file, creating the target's parent directories.
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    create_parent(to)?;
    fs::rename(from, to)?;
    trace!(?from, ?to, "Moved");
    Ok(())
}

fn create_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent),
        None => Ok(()),
    }
}

/// Set a file's modification time to `seconds` since the epoch.
pub fn set_modified(path: &Path, seconds: i64) -> Result<()> {
    let time = Timestamp::from_second(seconds)?;
    let file = fs::File::open(path)?;
    file.set_modified(time.into())?;
    Ok(())
}

/// Remove every empty directory below the root, deepest first. The control
/// directory and the root itself are left alone.
pub fn remove_empty_dirs(workspace: &Workspace) -> Result<usize> {
    let mut removed = 0;
    let walker = WalkDir::new(workspace.root())
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_entry(|entry| entry.depth() != 1 || entry.file_name() != CONTROL_DIR);

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let is_empty = fs::read_dir(entry.path())?.next().is_none();
        if is_empty {
            fs::remove_dir(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_and_discover() {
        let dir = tempfile::TempDir::new().unwrap();
        let workspace = Workspace::init(dir.path()).unwrap();
        assert!(dir.path().join(".arciv/timeline").is_file());
        assert!(dir.path().join(".arciv/repositories").is_file());
        assert!(dir.path().join(".arciv/list").is_dir());
        assert!(dir.path().join(".arciv/blob").is_dir());

        let nested = dir.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(Workspace::discover(&nested).unwrap(), workspace);
    }

    #[test]
    fn init_keeps_existing_records() {
        let dir = tempfile::TempDir::new().unwrap();
        let workspace = Workspace::init(dir.path()).unwrap();
        fs::write(workspace.repositories_path(), "name:x type:file path:/x\n").unwrap();
        Workspace::init(dir.path()).unwrap();
        assert_eq!(
            fs::read_to_string(workspace.repositories_path()).unwrap(),
            "name:x type:file path:/x\n"
        );
    }

    #[test]
    fn discover_fails_without_control_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            Workspace::discover(dir.path()),
            Err(Error::RootNotFound(_))
        ));
    }

    #[test]
    fn removes_only_empty_dirs() {
        let dir = tempfile::TempDir::new().unwrap();
        let workspace = Workspace::init(dir.path()).unwrap();
        fs::create_dir_all(dir.path().join("a/b/c")).unwrap();
        fs::create_dir_all(dir.path().join("d")).unwrap();
        fs::write(dir.path().join("d/keep"), b"x").unwrap();

        assert_eq!(remove_empty_dirs(&workspace).unwrap(), 3);
        assert!(!dir.path().join("a").exists());
        assert!(dir.path().join("d/keep").exists());
        assert!(dir.path().join(".arciv/list").is_dir());
    }

    #[test]
    fn set_modified_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"x").unwrap();
        set_modified(&path, 1_600_000_000).unwrap();
        assert_eq!(
            crate::tag::modified_seconds(&path).unwrap(),
            1_600_000_000
        );
    }

    #[test]
    fn set_modified_on_read_only_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ro.jpg");
        fs::write(&path, b"x").unwrap();
        let mut permissions = fs::metadata(&path).unwrap().permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&path, permissions).unwrap();

        set_modified(&path, 1_500_000_000).unwrap();
        assert_eq!(crate::tag::modified_seconds(&path).unwrap(), 1_500_000_000);
        assert!(fs::metadata(&path).unwrap().permissions().readonly());
    }

    #[test]
    fn file_path_stays_inside_the_tree() {
        let dir = tempfile::TempDir::new().unwrap();
        let workspace = Workspace::init(dir.path()).unwrap();
        assert_eq!(
            workspace.file_path("a/b.txt").unwrap(),
            dir.path().join("a").join("b.txt")
        );
        for path in ["../escaped", "a/../../b", "/abs", ".arciv/timeline", "", "a/./b"] {
            assert!(
                matches!(workspace.file_path(path), Err(Error::UnsafePath { .. })),
                "{path:?} was accepted"
            );
        }
    }

    #[test]
    fn cached_blobs_skip_foreign_names() {
        let dir = tempfile::TempDir::new().unwrap();
        let workspace = Workspace::init(dir.path()).unwrap();
        let hash = Digest::hash(b"x");
        fs::write(workspace.blob_path(&hash), b"x").unwrap();
        fs::write(dir.path().join(".arciv/blob/.tmpXYZ"), b"").unwrap();
        assert_eq!(workspace.cached_blobs().unwrap(), vec![hash]);
        assert!(workspace.has_blob(&hash));
    }
}

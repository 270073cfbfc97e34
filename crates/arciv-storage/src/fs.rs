use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::types::not_found_or_io;
use crate::{BLOB_PREFIX, Backend, LIST_PREFIX, StorageError, TIMELINE_KEY};

/// A repository stored in a directory on a local filesystem.
#[derive(Debug, Clone)]
pub struct FsBackend {
    base_path: PathBuf,
}

impl FsBackend {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn path(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.base_path.clone(), |path, part| path.join(part))
    }

    /// Atomic write: write to tempfile, then rename
    fn atomic_write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
        fs::create_dir_all(parent)?;

        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        temp.write_all(data)?;
        temp.flush()?;
        temp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Copy `from` to `to` through a tempfile next to `to`, so a partial copy
    /// never appears under the final name.
    fn atomic_copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        let parent = to
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
        fs::create_dir_all(parent)?;

        let temp = tempfile::NamedTempFile::new_in(parent)?;
        let bytes = fs::copy(from, temp.path())?;
        temp.persist(to).map_err(|e| e.error)?;
        Ok(bytes)
    }
}

impl Backend for FsBackend {
    fn init(&self) -> Result<(), StorageError> {
        fs::create_dir_all(self.path(LIST_PREFIX))?;
        fs::create_dir_all(self.path(BLOB_PREFIX))?;

        let timeline = self.path(TIMELINE_KEY);
        if !timeline.exists() {
            self.atomic_write(&timeline, b"")?;
        }
        Ok(())
    }

    fn load_lines(&self, key: &str) -> Result<Vec<String>, StorageError> {
        let text = fs::read_to_string(self.path(key)).map_err(not_found_or_io(key))?;
        Ok(text.lines().map(String::from).collect())
    }

    fn write_lines(&self, key: &str, lines: &[String]) -> Result<(), StorageError> {
        let mut text = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
        for line in lines {
            text.push_str(line);
            text.push('\n');
        }
        self.atomic_write(&self.path(key), text.as_bytes())?;
        Ok(())
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let dir = self.path(prefix);

        // If directory doesn't exist, return empty list
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn put_file(&self, from: &Path, key: &str) -> Result<(), StorageError> {
        let to = self.path(key);
        let bytes = self.atomic_copy(from, &to)?;
        debug!(?from, ?to, bytes, "Copied file into repository");
        Ok(())
    }

    fn get_file(&self, key: &str, to: &Path) -> Result<(), StorageError> {
        let from = self.path(key);
        let bytes = self
            .atomic_copy(&from, to)
            .map_err(not_found_or_io(key))?;
        debug!(?from, ?to, bytes, "Copied file out of repository");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_key;

    #[test]
    fn init_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let backend = FsBackend::new(dir.path());
        backend.init().unwrap();

        backend
            .write_lines(TIMELINE_KEY, &["a".to_string()])
            .unwrap();
        backend.init().unwrap();

        assert_eq!(backend.load_lines(TIMELINE_KEY).unwrap(), vec!["a"]);
        assert!(dir.path().join(".arciv/list").is_dir());
        assert!(dir.path().join(".arciv/blob").is_dir());
    }

    #[test]
    fn missing_record_is_not_found() {
        let dir = tempfile::TempDir::new().unwrap();
        let backend = FsBackend::new(dir.path());
        let err = backend.load_lines(".arciv/list/nothing").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn lines_roundtrip_with_empty_record() {
        let dir = tempfile::TempDir::new().unwrap();
        let backend = FsBackend::new(dir.path());
        backend.write_lines("records/empty", &[]).unwrap();
        assert!(backend.load_lines("records/empty").unwrap().is_empty());

        let lines = vec!["first".to_string(), "second line".to_string()];
        backend.write_lines("records/two", &lines).unwrap();
        assert_eq!(backend.load_lines("records/two").unwrap(), lines);
    }

    #[test]
    fn put_get_and_list() {
        let dir = tempfile::TempDir::new().unwrap();
        let backend = FsBackend::new(dir.path().join("repo"));
        backend.init().unwrap();

        let source = dir.path().join("source.txt");
        fs::write(&source, b"hello").unwrap();
        backend.put_file(&source, &blob_key("abcd")).unwrap();

        let names = backend.list_keys(BLOB_PREFIX).unwrap();
        assert_eq!(names, vec!["abcd"]);

        let target = dir.path().join("out/nested/target.txt");
        backend.get_file(&blob_key("abcd"), &target).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"hello");
    }

    #[test]
    fn list_missing_prefix_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let backend = FsBackend::new(dir.path());
        assert!(backend.list_keys("nowhere").unwrap().is_empty());
    }

    #[test]
    fn get_missing_blob_is_not_found() {
        let dir = tempfile::TempDir::new().unwrap();
        let backend = FsBackend::new(dir.path());
        let err = backend
            .get_file(&blob_key("ffff"), &dir.path().join("x"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn thaw_is_unsupported() {
        let dir = tempfile::TempDir::new().unwrap();
        let backend = FsBackend::new(dir.path());
        assert!(matches!(
            backend.request_thaw(&blob_key("ffff"), 3),
            Err(StorageError::Unsupported(_))
        ));
    }
}

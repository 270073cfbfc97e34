//! Repositories and the registry of remotes.
//!
//! The local workspace is always available as the repository named `self`.
//! Other repositories are registered in `.arciv/repositories`, one descriptor
//! per line.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use arciv_storage::{Backend, BLOB_PREFIX, FsBackend, ObjectBackend, StorageError, blob_key};
use tracing::{debug, info};
use url::Url;

use crate::chain::{self, AddOutcome};
use crate::commit::{Commit, CommitId, resolve_alias};
use crate::digest::Digest;
use crate::error::{Error, Result};
use crate::tag::Tag;
use crate::workspace::Workspace;

/// Name of the local repository.
pub const SELF_NAME: &str = "self";

/// Key of the registry inside the local control directory.
pub const REPOSITORIES_KEY: &str = ".arciv/repositories";

/// Where a repository lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    File {
        path: PathBuf,
    },
    S3 {
        bucket: String,
        region: String,
        /// Storage class for uploaded blobs, e.g. `DEEP_ARCHIVE`.
        storage_class: Option<String>,
    },
}

impl Location {
    /// Parse `file:///abs/path` or `s3://bucket?region=r[&storage-class=c]`.
    pub fn from_url(input: &str) -> Result<Self> {
        let invalid = || Error::RepositoryUrl(input.to_string());
        let url = Url::parse(input).map_err(|_| invalid())?;

        match url.scheme() {
            "file" => {
                let path = url.to_file_path().map_err(|_| invalid())?;
                Ok(Location::File { path })
            }
            "s3" => {
                let bucket = url
                    .host_str()
                    .filter(|host| !host.is_empty())
                    .ok_or_else(invalid)?
                    .to_string();
                let mut region = None;
                let mut storage_class = None;
                for (key, value) in url.query_pairs() {
                    match key.as_ref() {
                        "region" => region = Some(value.into_owned()),
                        "storage-class" => storage_class = Some(value.into_owned()),
                        _ => return Err(invalid()),
                    }
                }
                Ok(Location::S3 {
                    bucket,
                    region: region.ok_or_else(invalid)?,
                    storage_class,
                })
            }
            _ => Err(invalid()),
        }
    }
}

/// The backend behind a repository.
#[derive(Debug)]
pub enum Store {
    File(FsBackend),
    Object(ObjectBackend),
}

impl Store {
    pub fn open(location: &Location) -> Result<Self> {
        match location {
            Location::File { path } => Ok(Store::File(FsBackend::new(path))),
            Location::S3 {
                bucket,
                region,
                storage_class,
            } => {
                let mut backend = ObjectBackend::s3(bucket, region)?;
                if let Some(class) = storage_class {
                    backend = backend.with_storage_class(class);
                }
                Ok(Store::Object(backend))
            }
        }
    }
}

impl Backend for Store {
    fn init(&self) -> Result<(), StorageError> {
        match self {
            Store::File(backend) => backend.init(),
            Store::Object(backend) => backend.init(),
        }
    }

    fn load_lines(&self, key: &str) -> Result<Vec<String>, StorageError> {
        match self {
            Store::File(backend) => backend.load_lines(key),
            Store::Object(backend) => backend.load_lines(key),
        }
    }

    fn write_lines(&self, key: &str, lines: &[String]) -> Result<(), StorageError> {
        match self {
            Store::File(backend) => backend.write_lines(key, lines),
            Store::Object(backend) => backend.write_lines(key, lines),
        }
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        match self {
            Store::File(backend) => backend.list_keys(prefix),
            Store::Object(backend) => backend.list_keys(prefix),
        }
    }

    fn put_file(&self, from: &Path, key: &str) -> Result<(), StorageError> {
        match self {
            Store::File(backend) => backend.put_file(from, key),
            Store::Object(backend) => backend.put_file(from, key),
        }
    }

    fn get_file(&self, key: &str, to: &Path) -> Result<(), StorageError> {
        match self {
            Store::File(backend) => backend.get_file(key, to),
            Store::Object(backend) => backend.get_file(key, to),
        }
    }

    fn request_thaw(&self, key: &str, valid_days: u32) -> Result<(), StorageError> {
        match self {
            Store::File(backend) => backend.request_thaw(key, valid_days),
            Store::Object(backend) => backend.request_thaw(key, valid_days),
        }
    }
}

/// A registered repository: its name and where it lives.
///
/// Serialised as `name:<n> type:file path:<p>` or
/// `name:<n> type:s3 region:<r> bucket:<b>[ storage-class:<c>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    pub name: String,
    pub location: Location,
}

impl Remote {
    pub fn new(name: impl Into<String>, location: Location) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.contains([' ', ':']) {
            return Err(Error::RepositoryName(name));
        }
        Ok(Self { name, location })
    }
}

impl fmt::Display for Remote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "name:{} ", self.name)?;
        match &self.location {
            Location::File { path } => write!(f, "type:file path:{}", path.display()),
            Location::S3 {
                bucket,
                region,
                storage_class,
            } => {
                write!(f, "type:s3 region:{region} bucket:{bucket}")?;
                if let Some(class) = storage_class {
                    write!(f, " storage-class:{class}")?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for Remote {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let invalid = |reason| Error::Descriptor {
            line: line.to_string(),
            reason,
        };

        let (name, rest) = line
            .strip_prefix("name:")
            .and_then(|rest| rest.split_once(' '))
            .ok_or_else(|| invalid("expected name:<name> first"))?;
        let (kind, rest) = rest
            .strip_prefix("type:")
            .and_then(|rest| rest.split_once(' '))
            .ok_or_else(|| invalid("expected type:<type> after the name"))?;

        let location = match kind {
            "file" => {
                let path = rest
                    .strip_prefix("path:")
                    .filter(|path| !path.is_empty())
                    .ok_or_else(|| invalid("expected path:<path>"))?;
                Location::File {
                    path: PathBuf::from(path),
                }
            }
            "s3" => {
                let mut region = None;
                let mut bucket = None;
                let mut storage_class = None;
                for field in rest.split(' ') {
                    match field.split_once(':') {
                        Some(("region", value)) => region = Some(value.to_string()),
                        Some(("bucket", value)) => bucket = Some(value.to_string()),
                        Some(("storage-class", value)) => storage_class = Some(value.to_string()),
                        _ => return Err(invalid("unknown s3 field")),
                    }
                }
                Location::S3 {
                    bucket: bucket.ok_or_else(|| invalid("missing bucket"))?,
                    region: region.ok_or_else(|| invalid("missing region"))?,
                    storage_class,
                }
            }
            _ => return Err(invalid("unknown repository type")),
        };

        Remote::new(name, location)
    }
}

/// The repositories registered in a workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    remotes: Vec<Remote>,
}

impl Registry {
    /// Read `.arciv/repositories`. A missing registry is empty.
    pub fn load(workspace: &Workspace) -> Result<Self> {
        let lines = match FsBackend::new(workspace.root()).load_lines(REPOSITORIES_KEY) {
            Ok(lines) => lines,
            Err(err) if err.is_not_found() => Vec::new(),
            Err(err) => return Err(err.into()),
        };

        let mut registry = Self::default();
        for line in lines.iter().filter(|line| !line.is_empty()) {
            registry.add(line.parse()?)?;
        }
        Ok(registry)
    }

    pub fn save(&self, workspace: &Workspace) -> Result<()> {
        let lines: Vec<String> = self.remotes.iter().map(Remote::to_string).collect();
        FsBackend::new(workspace.root()).write_lines(REPOSITORIES_KEY, &lines)?;
        Ok(())
    }

    pub fn remotes(&self) -> &[Remote] {
        &self.remotes
    }

    pub fn add(&mut self, remote: Remote) -> Result<()> {
        if remote.name == SELF_NAME {
            return Err(Error::ReservedRepository(remote.name));
        }
        if self.remotes.iter().any(|r| r.name == remote.name) {
            return Err(Error::DuplicateRepository(remote.name));
        }
        self.remotes.push(remote);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<Remote> {
        if name == SELF_NAME {
            return Err(Error::ReservedRepository(name.to_string()));
        }
        let index = self
            .remotes
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| Error::RepositoryNotFound(name.to_string()))?;
        Ok(self.remotes.remove(index))
    }

    pub fn find(&self, name: &str) -> Result<&Remote> {
        self.remotes
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| Error::RepositoryNotFound(name.to_string()))
    }

    /// Open a repository by name; `self` is the workspace itself.
    pub fn open(&self, workspace: &Workspace, name: &str) -> Result<Repository> {
        if name == SELF_NAME {
            return Ok(Repository::local(workspace));
        }
        Repository::open(self.find(name)?)
    }
}

/// A repository with an open backend.
#[derive(Debug)]
pub struct Repository {
    name: String,
    location: Location,
    store: Store,
}

impl Repository {
    pub fn open(remote: &Remote) -> Result<Self> {
        let store = Store::open(&remote.location)?;
        debug!(name = %remote.name, "Opened repository");
        Ok(Self::with_store(
            remote.name.clone(),
            remote.location.clone(),
            store,
        ))
    }

    /// The workspace's own repository.
    pub fn local(workspace: &Workspace) -> Self {
        let location = Location::File {
            path: workspace.root().to_path_buf(),
        };
        Self::with_store(
            SELF_NAME,
            location,
            Store::File(FsBackend::new(workspace.root())),
        )
    }

    pub fn with_store(name: impl Into<String>, location: Location, store: Store) -> Self {
        Self {
            name: name.into(),
            location,
            store,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The registry entry describing this repository.
    pub fn remote(&self) -> Remote {
        Remote {
            name: self.name.clone(),
            location: self.location.clone(),
        }
    }

    pub fn init(&self) -> Result<()> {
        self.store.init()?;
        info!(name = %self.name, "Initialised repository");
        Ok(())
    }

    pub fn timeline(&self) -> Result<Vec<CommitId>> {
        chain::load_timeline(&self.store)
    }

    pub fn latest(&self) -> Result<Option<Commit>> {
        match self.timeline()?.last() {
            Some(id) => Ok(Some(self.load_commit(id)?)),
            None => Ok(None),
        }
    }

    pub fn load_commit(&self, id: &CommitId) -> Result<Commit> {
        chain::load_commit(&self.store, id)
    }

    pub fn load_commit_from_alias(&self, alias: &str) -> Result<Commit> {
        let timeline = self.timeline()?;
        let id = resolve_alias(alias, &timeline)?;
        self.load_commit(id)
    }

    pub fn add_commit(&self, commit: &Commit) -> Result<AddOutcome> {
        chain::add_commit(&self.store, commit)
    }

    /// Sorted hashes of the blobs in this repository. Names that are not
    /// 64-hex hashes, such as partial uploads, are skipped.
    pub fn blob_hashes(&self) -> Result<Vec<Digest>> {
        let mut hashes = self
            .store
            .list_keys(BLOB_PREFIX)?
            .iter()
            .filter(|name| Digest::is_hex_name(name))
            .map(|name| name.parse())
            .collect::<Result<Vec<Digest>>>()?;
        hashes.sort();
        Ok(hashes)
    }

    /// Upload the working files behind `tags`, one per distinct hash.
    pub fn send_local_blobs(&self, workspace: &Workspace, tags: &[Tag]) -> Result<usize> {
        let mut sent: Vec<Digest> = Vec::new();
        for tag in tags {
            if sent.contains(&tag.hash) {
                continue;
            }
            self.store
                .put_file(&workspace.file_path(&tag.path)?, &blob_key(&tag.hash.as_hex()))?;
            sent.push(tag.hash);
        }
        info!(name = %self.name, blobs = sent.len(), "Sent blobs");
        Ok(sent.len())
    }

    /// Download blobs into the workspace's blob cache.
    pub fn receive_remote_blobs(&self, workspace: &Workspace, hashes: &[Digest]) -> Result<usize> {
        for hash in hashes {
            self.store
                .get_file(&blob_key(&hash.as_hex()), &workspace.blob_path(hash))?;
        }
        info!(name = %self.name, blobs = hashes.len(), "Received blobs");
        Ok(hashes.len())
    }

    pub fn request_thaw(&self, hash: &Digest, valid_days: u32) -> Result<()> {
        self.store.request_thaw(&blob_key(&hash.as_hex()), valid_days)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn descriptors() {
        let file: Remote = "name:backup type:file path:/mnt/my backups".parse().unwrap();
        assert_eq!(
            file.location,
            Location::File {
                path: PathBuf::from("/mnt/my backups")
            }
        );
        assert_eq!(file.to_string(), "name:backup type:file path:/mnt/my backups");

        let line = "name:cold type:s3 region:ap-northeast-1 bucket:vault storage-class:DEEP_ARCHIVE";
        let s3: Remote = line.parse().unwrap();
        assert_eq!(
            s3.location,
            Location::S3 {
                bucket: "vault".to_string(),
                region: "ap-northeast-1".to_string(),
                storage_class: Some("DEEP_ARCHIVE".to_string()),
            }
        );
        assert_eq!(s3.to_string(), line);
    }

    #[test]
    fn bad_descriptors() {
        for line in [
            "backup type:file path:/x",
            "name:backup path:/x",
            "name:backup type:file path:",
            "name:backup type:ftp path:/x",
            "name:cold type:s3 bucket:vault",
            "name:cold type:s3 region:r bucket:b colour:blue",
        ] {
            assert!(line.parse::<Remote>().is_err(), "{line}");
        }
    }

    #[test]
    fn urls() {
        assert_eq!(
            Location::from_url("file:///srv/arciv").unwrap(),
            Location::File {
                path: PathBuf::from("/srv/arciv")
            }
        );
        assert_eq!(
            Location::from_url("s3://vault?region=us-east-1&storage-class=GLACIER").unwrap(),
            Location::S3 {
                bucket: "vault".to_string(),
                region: "us-east-1".to_string(),
                storage_class: Some("GLACIER".to_string()),
            }
        );
        assert!(Location::from_url("s3://vault").is_err());
        assert!(Location::from_url("http://example.com").is_err());
        assert!(Location::from_url("/plain/path").is_err());
    }

    #[test]
    fn registry_rules() {
        let dir = tempfile::TempDir::new().unwrap();
        let workspace = Workspace::init(dir.path()).unwrap();
        let location = Location::File {
            path: dir.path().join("remote"),
        };

        let mut registry = Registry::load(&workspace).unwrap();
        registry
            .add(Remote::new("backup", location.clone()).unwrap())
            .unwrap();
        assert!(matches!(
            registry.add(Remote::new("backup", location.clone()).unwrap()),
            Err(Error::DuplicateRepository(_))
        ));
        assert!(matches!(
            registry.add(Remote::new("self", location.clone()).unwrap()),
            Err(Error::ReservedRepository(_))
        ));
        assert!(matches!(
            Remote::new("two words", location.clone()),
            Err(Error::RepositoryName(_))
        ));
        registry.save(&workspace).unwrap();

        let mut reloaded = Registry::load(&workspace).unwrap();
        assert_eq!(reloaded, registry);
        assert!(matches!(reloaded.remove("self"), Err(Error::ReservedRepository(_))));
        assert!(matches!(reloaded.remove("nope"), Err(Error::RepositoryNotFound(_))));
        reloaded.remove("backup").unwrap();
        assert!(reloaded.remotes().is_empty());
    }

    #[test]
    fn self_is_always_available() {
        let dir = tempfile::TempDir::new().unwrap();
        let workspace = Workspace::init(dir.path()).unwrap();
        let repository = Registry::default().open(&workspace, "self").unwrap();
        assert_eq!(repository.name(), "self");
        assert!(repository.timeline().unwrap().is_empty());
    }

    #[test]
    fn blob_listing_and_transfer() {
        let dir = tempfile::TempDir::new().unwrap();
        let workspace = Workspace::init(dir.path().join("work")).unwrap();
        fs::write(workspace.file_path("a.txt").unwrap(), b"same").unwrap();
        fs::write(workspace.file_path("b.txt").unwrap(), b"same").unwrap();
        let hash = Digest::hash(b"same");

        let remote = Repository::open(
            &Remote::new(
                "backup",
                Location::File {
                    path: dir.path().join("remote"),
                },
            )
            .unwrap(),
        )
        .unwrap();
        remote.init().unwrap();

        let tags = vec![Tag::new("a.txt", hash, 1), Tag::new("b.txt", hash, 1)];
        assert_eq!(remote.send_local_blobs(&workspace, &tags).unwrap(), 1);
        assert_eq!(remote.blob_hashes().unwrap(), vec![hash]);

        remote.receive_remote_blobs(&workspace, &[hash]).unwrap();
        assert_eq!(fs::read(workspace.blob_path(&hash)).unwrap(), b"same");
    }
}

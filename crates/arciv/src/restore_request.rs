//! Pending cold-storage restores.
//!
//! A request records which blobs were asked to be thawed, so that a later run
//! can download them once the storage class makes them readable.

use std::fs;

use arciv_storage::{Backend, CONTROL_DIR, FsBackend};
use tracing::debug;
use uuid::Uuid;

use crate::commit::CommitId;
use crate::digest::Digest;
use crate::error::{Error, Result};
use crate::repository::Remote;
use crate::workspace::Workspace;

const HEADER: &str = "#arciv-restore-request";

fn request_key(id: &str) -> Result<String> {
    Uuid::parse_str(id).map_err(|_| Error::RestoreRequestId(id.to_string()))?;
    Ok(format!("{CONTROL_DIR}/restore-request/{id}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreRequest {
    pub remote: Remote,
    pub valid_days: u32,
    pub commit: CommitId,
    /// Blobs whose thaw was accepted.
    pub blobs: Vec<Digest>,
}

impl RestoreRequest {
    pub fn to_lines(&self) -> Vec<String> {
        let mut lines = vec![
            HEADER.to_string(),
            format!("#valid-days:{}", self.valid_days),
            format!("#repo:{}", self.remote),
            format!("#commit:{}", self.commit),
        ];
        lines.extend(self.blobs.iter().map(Digest::as_hex));
        lines
    }

    pub fn parse(lines: &[String]) -> Result<Self> {
        let invalid = |what: &str| Error::RestoreRequest(what.to_string());

        let [header, valid_days, repo, commit, blobs @ ..] = lines else {
            return Err(invalid("too few lines"));
        };
        if header != HEADER {
            return Err(invalid("missing header"));
        }
        let valid_days = valid_days
            .strip_prefix("#valid-days:")
            .and_then(|days| days.parse::<u32>().ok())
            .ok_or_else(|| invalid("bad #valid-days line"))?;
        let remote = repo
            .strip_prefix("#repo:")
            .ok_or_else(|| invalid("bad #repo line"))?
            .parse()?;
        let commit = commit
            .strip_prefix("#commit:")
            .ok_or_else(|| invalid("bad #commit line"))?
            .parse()?;
        let blobs = blobs
            .iter()
            .map(|line| line.parse())
            .collect::<Result<Vec<Digest>>>()?;

        Ok(Self {
            remote,
            valid_days,
            commit,
            blobs,
        })
    }

    /// Persist under a fresh id and return the id.
    pub fn save(&self, workspace: &Workspace) -> Result<String> {
        let id = Uuid::new_v4().simple().to_string();
        FsBackend::new(workspace.root()).write_lines(&request_key(&id)?, &self.to_lines())?;
        debug!(%id, blobs = self.blobs.len(), "Saved restore request");
        Ok(id)
    }

    pub fn load(workspace: &Workspace, id: &str) -> Result<Self> {
        let lines = FsBackend::new(workspace.root()).load_lines(&request_key(id)?)?;
        Self::parse(&lines)
    }

    pub fn remove(workspace: &Workspace, id: &str) -> Result<()> {
        request_key(id)?;
        fs::remove_file(workspace.restore_request_dir().join(id))?;
        Ok(())
    }

    /// Ids of the pending requests.
    pub fn list(workspace: &Workspace) -> Result<Vec<String>> {
        let key = format!("{CONTROL_DIR}/restore-request");
        let mut ids = FsBackend::new(workspace.root()).list_keys(&key)?;
        ids.retain(|id| Uuid::parse_str(id).is_ok());
        ids.sort();
        Ok(ids)
    }
}

//! Put the latest commit back from the blob cache

use clap::Args;

use arciv::{Error, Repository, sync};

use super::current_workspace;

/// Restore the files of the latest commit from .arciv/blob
#[derive(Args, Debug)]
pub struct UnstashArgs {}

pub fn run(_args: UnstashArgs) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let workspace = current_workspace()?;
    let latest = Repository::local(&workspace)
        .latest()?
        .ok_or(Error::NoCommits)?;
    let report = sync::unstash(&workspace, &latest.tags)?;
    eprintln!(
        "Unstashed commit {} ({} moved, {} copied)",
        latest.id, report.moved, report.copied
    );
    Ok(())
}

//! Move the tree into the blob cache

use clap::Args;

use arciv::sync;

use super::current_workspace;

/// Commit the tree, then move every file into .arciv/blob
///
/// Run `unstash` to put the files back.
#[derive(Args, Debug)]
pub struct StashArgs {}

pub fn run(_args: StashArgs) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let workspace = current_workspace()?;
    let (commit, _) = sync::commit(&workspace, false)?;
    let files = sync::stash(&workspace, &commit.tags)?;
    eprintln!("Stashed {files} files of commit {}", commit.id);
    Ok(())
}

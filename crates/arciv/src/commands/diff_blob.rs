//! Compare the blobs of two commits

use clap::Args;

use arciv::{Error, Repository, diff_hashes};

use super::current_workspace;

/// Show which content hashes two local commits do not share
#[derive(Args, Debug)]
pub struct DiffBlobArgs {
    /// Older commit alias
    from: String,

    /// Newer commit alias
    to: String,
}

pub fn run(args: DiffBlobArgs) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let workspace = current_workspace()?;
    let local = Repository::local(&workspace);
    let from = local.load_commit_from_alias(&args.from)?;
    let to = local.load_commit_from_alias(&args.to)?;
    if from.id == to.id {
        return Err(Error::SameCommit.into());
    }

    let delta = diff_hashes(&from.hashes(), &to.hashes());
    for hash in &delta.deleted {
        println!("- {hash}");
    }
    for hash in &delta.added {
        println!("+ {hash}");
    }
    Ok(())
}

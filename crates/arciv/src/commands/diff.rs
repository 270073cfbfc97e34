//! Compare two commits

use clap::Args;

use arciv::{Error, Repository, classify, diff};

use super::current_workspace;

/// Show the changes between two local commits
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Older commit alias
    from: String,

    /// Newer commit alias
    to: String,
}

pub fn run(args: DiffArgs) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let workspace = current_workspace()?;
    let local = Repository::local(&workspace);
    let from = local.load_commit_from_alias(&args.from)?;
    let to = local.load_commit_from_alias(&args.to)?;
    if from.id == to.id {
        return Err(Error::SameCommit.into());
    }

    for change in classify(&diff(&from.tags, &to.tags)) {
        println!("{change}");
    }
    Ok(())
}

//! Record the current tree

use clap::Args;

use arciv::AddOutcome;
use arciv::sync;

use super::current_workspace;

/// Snapshot the tree into the local timeline
#[derive(Args, Debug)]
pub struct CommitArgs {
    /// Reuse hashes of files whose path and mtime match the latest commit
    #[arg(long, short = 's')]
    fast: bool,
}

pub fn run(args: CommitArgs) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let workspace = current_workspace()?;
    let (commit, outcome) = sync::commit(&workspace, args.fast)?;

    match outcome {
        AddOutcome::Appended { depth } => {
            eprintln!("Created commit {} ({} files, depth {depth})", commit.id, commit.tags.len())
        }
        AddOutcome::Unchanged => eprintln!("Nothing changed since the latest commit"),
        AddOutcome::AlreadyPresent => eprintln!("Commit {} already recorded", commit.id),
    }
    println!("{}", commit.id);
    Ok(())
}

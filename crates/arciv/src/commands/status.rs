//! Show changes since the latest commit

use clap::Args;

use arciv::{Repository, classify, diff, take_snapshot};

use super::current_workspace;

/// Print the difference between the latest commit and the tree
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Reuse hashes of files whose path and mtime match the latest commit
    #[arg(long, short = 's')]
    fast: bool,
}

pub fn run(args: StatusArgs) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let workspace = current_workspace()?;
    let latest = Repository::local(&workspace).latest()?;
    let fast = if args.fast { latest.as_ref() } else { None };
    let current = take_snapshot(&workspace, fast)?;

    let before = latest.map(|commit| commit.tags).unwrap_or_default();
    let changes = classify(&diff(&before, &current.tags));
    if changes.is_empty() {
        eprintln!("No changes");
    }
    for change in changes {
        println!("{change}");
    }
    Ok(())
}

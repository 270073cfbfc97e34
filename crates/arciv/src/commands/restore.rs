//! Pull a commit from another repository

use clap::Args;

use arciv::{Registry, sync};

use super::current_workspace;

/// Replace the tree with a commit from a repository
#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Source repository name
    repository: String,

    /// Commit alias in the source repository
    alias: String,

    /// Discard changes not saved in the latest local commit
    #[arg(long, short = 'f')]
    force: bool,

    /// Print what would be transferred and moved, without doing it
    #[arg(long, short = 'n')]
    dry_run: bool,
}

pub fn run(args: RestoreArgs) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let workspace = current_workspace()?;
    let remote = Registry::load(&workspace)?.open(&workspace, &args.repository)?;
    let plan = sync::plan_restore(&workspace, &remote, &args.alias, args.force)?;

    if args.dry_run {
        eprintln!("Dry run: restoring {}", plan.target.id);
        for hash in &plan.download {
            eprintln!("download {hash}");
        }
        for tag in &plan.current.tags {
            eprintln!("stash    {} -> {}", tag.path, tag.hash);
        }
        for tag in &plan.target.tags {
            eprintln!("unstash  {} -> {}", tag.hash, tag.path);
        }
        return Ok(());
    }

    let report = sync::execute_restore(&workspace, &remote, &plan)?;
    eprintln!("Restored commit {}", report.commit);
    eprintln!("  Blobs downloaded: {}", report.downloaded);
    eprintln!(
        "  Files placed: {} moved, {} copied",
        report.unstash.moved, report.unstash.copied
    );
    Ok(())
}

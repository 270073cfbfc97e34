//! Push the tree to another repository

use clap::Args;
use tracing::info;

use arciv::{Registry, sync};

use super::current_workspace;

/// Commit the tree and send the commit and its new blobs to a repository
#[derive(Args, Debug)]
pub struct StoreArgs {
    /// Target repository name
    #[arg(long, short = 'r')]
    repository: String,

    /// Reuse hashes of files whose path and mtime match the latest commit
    #[arg(long, short = 's')]
    fast: bool,
}

pub fn run(args: StoreArgs) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let workspace = current_workspace()?;
    let remote = Registry::load(&workspace)?.open(&workspace, &args.repository)?;

    info!(repository = %args.repository, fast = args.fast, "Storing");
    let report = sync::store(&workspace, &remote, args.fast)?;

    eprintln!("Stored commit {} to {}", report.commit, args.repository);
    eprintln!("  Blobs sent: {}", report.sent);
    eprintln!("  Local: {:?}", report.local);
    eprintln!("  Remote: {:?}", report.remote);
    Ok(())
}

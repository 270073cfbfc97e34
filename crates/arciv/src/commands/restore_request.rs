//! Restore from cold storage in two steps

use clap::Args;

use arciv::restore_request::RestoreRequest;
use arciv::{Registry, Repository, sync};

use super::current_workspace;

/// Ask a cold-storage repository to thaw the blobs of a commit
///
/// Prints the request id to pass to `restore-request-consume` once the blobs
/// are readable.
#[derive(Args, Debug)]
pub struct RestoreRequestArgs {
    /// Source repository name
    repository: Option<String>,

    /// Commit alias in the source repository
    alias: Option<String>,

    /// Days the thawed blobs stay readable
    #[arg(long, short = 'd', default_value_t = 1)]
    days: u32,

    /// List pending requests instead
    #[arg(long, short = 'l', conflicts_with_all = ["repository", "alias"])]
    list: bool,
}

pub fn run(args: RestoreRequestArgs) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let workspace = current_workspace()?;

    if args.list {
        for id in RestoreRequest::list(&workspace)? {
            let request = RestoreRequest::load(&workspace, &id)?;
            println!(
                "{id} {} {} ({} blobs)",
                request.remote.name,
                request.commit,
                request.blobs.len()
            );
        }
        return Ok(());
    }

    let (Some(repository), Some(alias)) = (args.repository, args.alias) else {
        return Err("Usage: arciv restore-request <repository> <alias> [--days N]".into());
    };
    let remote = Registry::load(&workspace)?.open(&workspace, &repository)?;
    let (id, request) = sync::request_restore(&workspace, &remote, &alias, args.days)?;

    eprintln!(
        "Requested {} blobs of {} for {} days",
        request.blobs.len(),
        request.commit,
        request.valid_days
    );
    println!("{id}");
    Ok(())
}

/// Complete a restore request once its blobs have thawed
#[derive(Args, Debug)]
pub struct ConsumeArgs {
    /// Request id printed by `restore-request`
    id: String,

    /// Discard changes not saved in the latest local commit
    #[arg(long, short = 'f')]
    force: bool,
}

pub fn consume(args: ConsumeArgs) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let workspace = current_workspace()?;
    let report = sync::consume_restore_request(&workspace, &args.id, args.force, Repository::open)?;

    eprintln!("Restored commit {}", report.commit);
    eprintln!("  Blobs downloaded: {}", report.downloaded);
    eprintln!(
        "  Files placed: {} moved, {} copied",
        report.unstash.moved, report.unstash.copied
    );
    Ok(())
}

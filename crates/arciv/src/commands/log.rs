//! Print a timeline or a commit

use clap::Args;

use arciv::{Commit, Error, Registry, Repository, SELF_NAME};

use super::current_workspace;

/// Print the timeline of a repository, or the files of one commit
///
/// With one argument, a repository name prints that repository's timeline and
/// anything else is taken as a commit alias in the local timeline.
#[derive(Args, Debug)]
pub struct LogArgs {
    /// Repository name or commit alias
    first: Option<String>,

    /// Commit alias in the named repository
    second: Option<String>,
}

pub fn run(args: LogArgs) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let workspace = current_workspace()?;
    let registry = Registry::load(&workspace)?;

    match (args.first, args.second) {
        (None, _) => print_timeline(&Repository::local(&workspace)),
        (Some(first), None) => match registry.open(&workspace, &first) {
            Ok(repository) => print_timeline(&repository),
            Err(Error::RepositoryNotFound(_)) => {
                print_commit(&Repository::local(&workspace).load_commit_from_alias(&first)?);
                Ok(())
            }
            Err(err) => Err(err.into()),
        },
        (Some(name), Some(alias)) => {
            let repository = registry.open(&workspace, &name)?;
            print_commit(&repository.load_commit_from_alias(&alias)?);
            Ok(())
        }
    }
}

fn print_timeline(repository: &Repository) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let timeline = repository.timeline()?;
    if timeline.is_empty() && repository.name() == SELF_NAME {
        eprintln!("No commits yet");
    }
    for id in timeline {
        println!("{id}");
    }
    Ok(())
}

fn print_commit(commit: &Commit) {
    for tag in &commit.tags {
        println!("{tag}");
    }
}

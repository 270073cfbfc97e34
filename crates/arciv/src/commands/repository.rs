//! Show, add or remove registered repositories

use clap::{Args, Subcommand};
use tracing::info;

use arciv::{Location, Registry, Remote, Repository};

use super::current_workspace;

/// Show, add or remove repositories
#[derive(Args, Debug)]
pub struct RepositoryArgs {
    #[command(subcommand)]
    action: Option<Action>,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// List registered repositories (the default)
    Show,

    /// Register and initialise a repository
    ///
    /// URL is file:///absolute/path or s3://bucket?region=REGION[&storage-class=CLASS]
    Add { name: String, url: String },

    /// Forget a repository. Its contents are left untouched.
    Remove { name: String },
}

pub fn run(args: RepositoryArgs) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let workspace = current_workspace()?;
    let mut registry = Registry::load(&workspace)?;

    match args.action.unwrap_or(Action::Show) {
        Action::Show => {
            println!("{}", Repository::local(&workspace).remote());
            for remote in registry.remotes() {
                println!("{remote}");
            }
        }
        Action::Add { name, url } => {
            let remote = Remote::new(name, Location::from_url(&url)?)?;
            registry.add(remote.clone())?;
            Repository::open(&remote)?.init()?;
            registry.save(&workspace)?;
            info!(name = %remote.name, "Added repository");
            eprintln!("Added {remote}");
        }
        Action::Remove { name } => {
            let remote = registry.remove(&name)?;
            registry.save(&workspace)?;
            info!(name = %remote.name, "Removed repository");
            eprintln!("Removed {remote}");
        }
    }
    Ok(())
}

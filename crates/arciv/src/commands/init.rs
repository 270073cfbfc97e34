//! Create the control directory

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use arciv::Workspace;

/// Start tracking a directory
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to track (defaults to the current directory)
    path: Option<PathBuf>,
}

pub fn run(args: InitArgs) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let root = match args.path {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let workspace = Workspace::init(&root)?;
    info!(root = ?workspace.root(), "Initialised");
    eprintln!("Initialised arciv in {:?}", workspace.control_dir());
    Ok(())
}

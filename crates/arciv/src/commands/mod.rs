//! Subcommands of the `arciv` binary.

use std::error::Error;

use clap::Subcommand;

use arciv::Workspace;

pub mod commit;
pub mod diff;
pub mod diff_blob;
pub mod init;
pub mod log;
pub mod object;
pub mod repository;
pub mod restore;
pub mod restore_request;
pub mod stash;
pub mod status;
pub mod store;
pub mod unstash;

#[derive(Subcommand, Debug)]
pub enum Command {
    Init(init::InitArgs),
    Repository(repository::RepositoryArgs),
    Commit(commit::CommitArgs),
    Status(status::StatusArgs),
    Diff(diff::DiffArgs),
    DiffBlob(diff_blob::DiffBlobArgs),
    Log(log::LogArgs),
    Stash(stash::StashArgs),
    Unstash(unstash::UnstashArgs),
    Store(store::StoreArgs),
    Restore(restore::RestoreArgs),
    RestoreRequest(restore_request::RestoreRequestArgs),
    RestoreRequestConsume(restore_request::ConsumeArgs),
    Object(object::ObjectArgs),
}

impl Command {
    pub fn run(self) -> Result<(), Box<dyn Error + Send + Sync>> {
        match self {
            Command::Init(args) => init::run(args),
            Command::Repository(args) => repository::run(args),
            Command::Commit(args) => commit::run(args),
            Command::Status(args) => status::run(args),
            Command::Diff(args) => diff::run(args),
            Command::DiffBlob(args) => diff_blob::run(args),
            Command::Log(args) => log::run(args),
            Command::Stash(args) => stash::run(args),
            Command::Unstash(args) => unstash::run(args),
            Command::Store(args) => store::run(args),
            Command::Restore(args) => restore::run(args),
            Command::RestoreRequest(args) => restore_request::run(args),
            Command::RestoreRequestConsume(args) => restore_request::consume(args),
            Command::Object(args) => object::run(args),
        }
    }
}

/// The workspace containing the current directory.
pub fn current_workspace() -> Result<Workspace, Box<dyn Error + Send + Sync>> {
    let cwd = std::env::current_dir()?;
    Ok(Workspace::discover(&cwd)?)
}

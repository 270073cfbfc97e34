//! Low-level access to an S3 bucket

use std::io::{self, BufRead};
use std::path::PathBuf;

use clap::{Args, Subcommand};

use arciv_storage::{Backend, ObjectBackend};

/// Read and write objects in an S3 bucket directly
#[derive(Args, Debug)]
pub struct ObjectArgs {
    /// Bucket region
    #[arg(long)]
    region: String,

    /// Bucket name
    #[arg(long)]
    bucket: String,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// List object names directly under a prefix
    List { prefix: String },

    /// Print a text object
    Load { key: String },

    /// Download an object to a file
    Download { key: String, path: PathBuf },

    /// Upload a file
    Upload {
        key: String,
        path: PathBuf,

        /// Storage class, e.g. DEEP_ARCHIVE
        #[arg(long)]
        storage_class: Option<String>,
    },

    /// Write stdin to a text object
    Write { key: String },

    /// Request a thaw of an archived object
    Thaw { key: String, days: u32 },
}

pub fn run(args: ObjectArgs) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let backend = ObjectBackend::s3(&args.bucket, &args.region)?;

    match args.action {
        Action::List { prefix } => {
            for name in backend.list_keys(&prefix)? {
                println!("{name}");
            }
        }
        Action::Load { key } => {
            for line in backend.load_lines(&key)? {
                println!("{line}");
            }
        }
        Action::Download { key, path } => backend.get_file(&key, &path)?,
        Action::Upload {
            key,
            path,
            storage_class,
        } => {
            let backend = match storage_class {
                Some(class) => backend.with_storage_class(class),
                None => backend,
            };
            backend.put_file(&path, &key)?;
        }
        Action::Write { key } => {
            let lines = io::stdin().lock().lines().collect::<Result<Vec<_>, _>>()?;
            backend.write_lines(&key, &lines)?;
        }
        Action::Thaw { key, days } => backend.request_thaw(&key, days)?,
    }
    Ok(())
}

use clap::Parser;
use lloggs::LoggingArgs;

mod commands;

use commands::Command;

#[derive(Parser, Debug)]
#[command(name = "arciv")]
#[command(about = "Content-addressed snapshots of a directory tree")]
struct Args {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    logging: LoggingArgs,
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    let _guard = args.logging.setup(|v| match v {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    })?;

    args.command.run()
}

//! `splash-write`: sends one command to a running `splash` daemon.
//!
//! Exits with a failure status when no daemon is listening. That is normal
//! early in boot or after the splash has quit, so it is only logged at debug
//! level.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::debug;

use splash::config::{self, FIFO_NAME};
use splash::{fifo, logger};

/// Send a command to the boot splash.
#[derive(Parser)]
#[command(name = "splash-write", version, about)]
struct Cli {
    /// The command, e.g. "PROGRESS 40", "MSG Starting network" or "QUIT".
    command: String,

    /// Directory of the command FIFO.
    #[arg(long)]
    fifo_dir: Option<PathBuf>,

    /// Log more; repeat for debug output.
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    let path = config::fifo_dir(cli.fifo_dir, |key| std::env::var_os(key)).join(FIFO_NAME);
    match fifo::send(&path, &cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!("cannot write to {}: {e}", path.display());
            ExitCode::FAILURE
        }
    }
}

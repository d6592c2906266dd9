mod artifacts;
mod calibration;
mod cli;
mod commands;
mod consistency;
mod failure_queue;
#[cfg(test)]
mod fixtures;
mod gate;
mod history;
mod metrics;
mod model;
mod signals;
mod stats;
mod thresholds;
mod util;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() {
    init_tracing();

    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            error!(error = %err, "command failed");
            for cause in err.chain().skip(1) {
                error!(cause = %cause, "caused by");
            }
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Gate(args) => commands::gate::run(args).map(|status| status.exit_code()),
        Commands::Calibrate(args) => commands::calibrate::run(args).map(|()| 0),
        Commands::Status(args) => commands::status::run(args).map(|()| 0),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

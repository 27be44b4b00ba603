mod cli;
mod config;
mod core;
mod error;
mod models;
mod sources;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::error::ArlError;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = cli::Cli::parse();
    init_logging(cli.verbose);
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "mbtag starting");

    if let Err(e) = cli::run(cli) {
        eprintln!("오류: {:#}", e);
        let code = e.downcast_ref::<ArlError>().map_or(1, ArlError::exit_code);
        std::process::exit(code);
    }
}

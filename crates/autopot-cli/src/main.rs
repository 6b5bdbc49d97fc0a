mod cli;
mod commands;
mod error;
mod logging;
mod ui;

use crate::cli::{Cli, Commands};
use crate::error::Result;
use crate::ui::UiManager;
use clap::Parser;
use tracing::{debug, info};

fn main() {
    if let Err(e) = run_app() {
        eprintln!("\nError: {e}");
        std::process::exit(1);
    }
}

fn run_app() -> Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.clone())?;

    info!("autopot v{} starting up", env!("CARGO_PKG_VERSION"));
    debug!("full CLI arguments parsed: {:?}", &cli);

    let ui = UiManager::new();
    match &cli.command {
        Commands::Train(args) => commands::train::execute(args, &ui),
        Commands::Select(args) => commands::select::execute(args, &ui),
        Commands::Grade(args) => commands::grade::execute(args, &ui),
    }
}

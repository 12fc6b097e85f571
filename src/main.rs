//! home-audio CLI
//!
//! Command-line interface for the home-audio processing frontend.

use clap::Parser;
use env_logger::Env;
use log::info;

use home_audio::cli::{commands, Cli, Commands};
use home_audio::Result;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    info!("home-audio v{}", env!("CARGO_PKG_VERSION"));

    handle_command(cli.command)
}

fn handle_command(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Run(args) => commands::run(&args),
        Commands::Convert {
            input,
            output,
            endpoint,
            virtualizer,
            profile,
        } => commands::convert(
            &input,
            &output,
            endpoint.as_deref(),
            virtualizer,
            profile.as_deref(),
        ),
        Commands::Endpoints { input } => commands::list_endpoints(&input),
    }
}

use anyhow::Result;
use clap::Parser;

use ccpulse::cli::commands;
use ccpulse::cli::{Cli, Commands};
use ccpulse::logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Check => commands::check::run().await,
        Commands::Discover { patterns } => commands::discover::run(patterns).await,
        Commands::Dashboard {
            range,
            start,
            end,
            json,
        } => commands::dashboard::run(range, start, end, json).await,
        Commands::Sessions { range, json } => commands::sessions::run(range, json).await,
        Commands::Insights {
            days,
            file,
            today,
            json,
        } => commands::insights::run(days, file, today, json).await,
        Commands::Health { range, json } => commands::health::run(range, json).await,
        Commands::Watch { range, interval } => commands::watch::run(range, interval).await,
        Commands::Serve { port, open } => commands::serve::run(port, open).await,
        Commands::Config { action } => commands::config::run(action).await,
    }
}

//! sitewatch Entry Point

use clap::Parser;
use sitewatch::cli::{Cli, Commands};
use sitewatch::logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let result = match cli.command {
        Some(Commands::Watch(args)) => sitewatch::cli::watch::execute(&args).await,
        None => sitewatch::cli::watch::execute(&Default::default()).await,
        Some(Commands::Check(args)) => sitewatch::cli::check::execute(&args).await,
        Some(Commands::Add(args)) => sitewatch::cli::targets::execute_add(&args).await,
        Some(Commands::Remove(args)) => sitewatch::cli::targets::execute_remove(&args).await,
        Some(Commands::List(args)) => sitewatch::cli::targets::execute_list(&args).await,
        Some(Commands::Fastest) => sitewatch::cli::lookup::execute_fastest().await,
        Some(Commands::Slowest) => sitewatch::cli::lookup::execute_slowest().await,
        Some(Commands::Get(args)) => sitewatch::cli::lookup::execute_get(&args).await,
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "sitewatch failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

//! Roster CLI - reconcile reservation shadows from the command line
//!
//! Every command resolves to one dispatcher operation against the configured
//! shadow source and the local database.

mod cli;
mod commands;
mod error;


use clap::Parser;
use roster_core::RosterConfig;

use crate::cli::{Cli, Commands};
use crate::commands::common::{open_dispatcher, resolve_db_path};
use crate::commands::delete::run_delete;
use crate::commands::dispatch::run_dispatch;
use crate::commands::fetch::run_fetch;
use crate::commands::purge::run_purge;
use crate::commands::reconcile::run_reconcile;
use crate::commands::show::run_show;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "roster=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = RosterConfig::from_env()?;
    let db_path = resolve_db_path(cli.db_path, &config)?;
    let dispatcher = open_dispatcher(&config, &db_path).await?;

    match cli.command {
        Commands::Reconcile { code, json } => run_reconcile(&dispatcher, &code, json).await?,
        Commands::Fetch { code } => run_fetch(&dispatcher, &code).await?,
        Commands::Show { code, json } => run_show(&dispatcher, &code, json).await?,
        Commands::Delete { code } => run_delete(&dispatcher, &code).await?,
        Commands::Purge { code } => run_purge(&dispatcher, &code).await?,
        Commands::Dispatch { event } => run_dispatch(&dispatcher, event).await?,
    }

    Ok(())
}

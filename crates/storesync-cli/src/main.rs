//! storesync CLI - Run pull and push sync jobs against a commerce store
//!
//! Each job runs as an isolated task and prints its terminal outcome as JSON.

mod cli;
mod commands;
mod error;


use clap::Parser;
use storesync_core::SyncSettings;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::audit::run_audit;
use crate::commands::common::resolve_db_path;
use crate::commands::pull::{run_pull, run_pull_all};
use crate::commands::push::run_push;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "storesync=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = SyncSettings::from_env()?;
    let db_path = resolve_db_path(cli.db_path, &settings);

    match cli.command {
        Commands::Pull { entity, job } => {
            run_pull(entity.into(), &job, &settings, &db_path).await?;
        }
        Commands::PullAll { job } => run_pull_all(&job, &settings, &db_path).await?,
        Commands::Push {
            operation,
            entity,
            record_id,
            job,
        } => {
            run_push(
                operation.into(),
                entity.into(),
                &record_id,
                &job,
                &settings,
                &db_path,
            )
            .await?;
        }
        Commands::Audit { limit, json } => run_audit(limit, json, &db_path)?,
    }

    Ok(())
}

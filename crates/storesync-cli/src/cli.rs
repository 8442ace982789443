use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use storesync_core::models::PushOperation;
use storesync_core::EntityType;

#[derive(Parser)]
#[command(name = "storesync")]
#[command(about = "Synchronize a commerce store's catalog with local storage")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pull one entity type from the remote store
    Pull {
        /// Entity type to pull
        #[arg(long, value_enum)]
        entity: EntityArg,
        #[command(flatten)]
        job: JobArgs,
    },
    /// Pull products, customers and orders as concurrent jobs
    PullAll {
        #[command(flatten)]
        job: JobArgs,
    },
    /// Push one local record to the remote store
    Push {
        /// Remote operation to perform
        #[arg(value_enum)]
        operation: PushOperationArg,
        /// Entity type of the record
        #[arg(long, value_enum)]
        entity: EntityArg,
        /// Local record ID
        #[arg(long, value_name = "UUID")]
        record_id: String,
        #[command(flatten)]
        job: JobArgs,
    },
    /// Show recent sync audit events
    Audit {
        /// Number of events to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Where store credentials and job identity come from.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct JobArgs {
    /// Job invocation JSON file; store credentials are read from env without it
    #[arg(long, value_name = "FILE")]
    pub job: Option<PathBuf>,
    /// Organization that owns the synced records
    #[arg(long, value_name = "ID")]
    pub organization: Option<String>,
    /// Acting user recorded in the audit log
    #[arg(long, value_name = "ID")]
    pub user: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum EntityArg {
    Product,
    Customer,
    Order,
}

impl From<EntityArg> for EntityType {
    fn from(value: EntityArg) -> Self {
        match value {
            EntityArg::Product => Self::Product,
            EntityArg::Customer => Self::Customer,
            EntityArg::Order => Self::Order,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum PushOperationArg {
    Create,
    Update,
    Delete,
}

impl From<PushOperationArg> for PushOperation {
    fn from(value: PushOperationArg) -> Self {
        match value {
            PushOperationArg::Create => Self::Create,
            PushOperationArg::Update => Self::Update,
            PushOperationArg::Delete => Self::Delete,
        }
    }
}

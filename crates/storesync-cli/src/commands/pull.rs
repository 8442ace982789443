use std::collections::BTreeMap;
use std::path::Path;

use storesync_core::job::spawn_pull;
use storesync_core::{EntityType, JobOutcome, SyncSettings};

use crate::cli::JobArgs;
use crate::commands::common::{cancel_on_interrupt, open_context, print_json, resolve_invocation};
use crate::error::CliError;

pub async fn run_pull(
    entity: EntityType,
    args: &JobArgs,
    settings: &SyncSettings,
    db_path: &Path,
) -> Result<(), CliError> {
    let invocation = resolve_invocation(args)?;
    let (_store, context) = open_context(db_path, settings)?;

    let job = spawn_pull(context, invocation.connection.clone(), invocation.spec(entity));
    let interrupt = cancel_on_interrupt(vec![job.cancel_token().clone()]);
    let outcome = job.wait().await;
    interrupt.abort();

    print_json(&outcome)?;
    ensure_succeeded(&[&outcome])
}

/// Pull every entity type as independent concurrent jobs.
pub async fn run_pull_all(
    args: &JobArgs,
    settings: &SyncSettings,
    db_path: &Path,
) -> Result<(), CliError> {
    let invocation = resolve_invocation(args)?;
    let (_store, context) = open_context(db_path, settings)?;

    let jobs = EntityType::ALL
        .iter()
        .map(|&entity| {
            let job = spawn_pull(
                context.clone(),
                invocation.connection.clone(),
                invocation.spec(entity),
            );
            (entity, job)
        })
        .collect::<Vec<_>>();
    let interrupt = cancel_on_interrupt(
        jobs.iter()
            .map(|(_, job)| job.cancel_token().clone())
            .collect(),
    );

    let mut outcomes = BTreeMap::new();
    for (entity, job) in jobs {
        outcomes.insert(entity.as_str(), job.wait().await);
    }
    interrupt.abort();

    print_json(&outcomes)?;
    ensure_succeeded(&outcomes.values().collect::<Vec<_>>())
}

pub fn ensure_succeeded<T>(outcomes: &[&JobOutcome<T>]) -> Result<(), CliError> {
    let failed = outcomes.iter().filter(|outcome| !outcome.is_success()).count();
    if failed == 0 {
        Ok(())
    } else {
        Err(CliError::JobsFailed {
            failed,
            total: outcomes.len(),
        })
    }
}

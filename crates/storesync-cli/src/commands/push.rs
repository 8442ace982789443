use std::path::Path;

use storesync_core::job::{spawn_push, PushRequest};
use storesync_core::models::PushOperation;
use storesync_core::{EntityType, RecordId, SyncSettings};

use crate::cli::JobArgs;
use crate::commands::common::{cancel_on_interrupt, open_context, print_json, resolve_invocation};
use crate::commands::pull::ensure_succeeded;
use crate::error::CliError;

pub async fn run_push(
    operation: PushOperation,
    entity: EntityType,
    record_id: &str,
    args: &JobArgs,
    settings: &SyncSettings,
    db_path: &Path,
) -> Result<(), CliError> {
    let record_id = parse_record_id(record_id)?;
    let invocation = resolve_invocation(args)?;
    let (_store, context) = open_context(db_path, settings)?;

    let request = PushRequest {
        job: invocation.spec(entity),
        operation,
        record_id,
    };
    let job = spawn_push(context, invocation.connection, request);
    let interrupt = cancel_on_interrupt(vec![job.cancel_token().clone()]);
    let outcome = job.wait().await;
    interrupt.abort();

    print_json(&outcome)?;
    ensure_succeeded(&[&outcome])
}

pub fn parse_record_id(value: &str) -> Result<RecordId, CliError> {
    value
        .trim()
        .parse()
        .map_err(|_| CliError::InvalidArgument(format!("record id must be a UUID: {value}")))
}

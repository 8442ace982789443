use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::DateTime;
use serde::Serialize;
use storesync_core::audit::{AuditEvent, SyncAuditLogger};
use storesync_core::job::JobContext;
use storesync_core::models::JobRequest;
use storesync_core::store::SqliteDocumentStore;
use storesync_core::{EntityType, StoreConnection, SyncJobSpec, SyncSettings};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cli::JobArgs;
use crate::error::CliError;

const DEFAULT_USER_ID: &str = "cli";

/// Store connection plus the identity a job runs under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub connection: StoreConnection,
    pub organization_id: String,
    pub user_id: String,
}

impl Invocation {
    pub fn spec(&self, entity_type: EntityType) -> SyncJobSpec {
        SyncJobSpec::new(
            &self.connection.store_id,
            entity_type,
            &self.organization_id,
            &self.user_id,
        )
    }
}

/// Build the invocation from a job file when given, from the environment otherwise.
///
/// `--organization` and `--user` override the job file's values.
pub fn resolve_invocation(args: &JobArgs) -> Result<Invocation, CliError> {
    let organization = normalize_identifier(args.organization.as_deref());
    let user = normalize_identifier(args.user.as_deref());

    if let Some(path) = &args.job {
        let request = read_job_request(path)?;
        return Ok(Invocation {
            connection: request.connection()?,
            organization_id: organization.unwrap_or(request.organization_id),
            user_id: user.unwrap_or(request.user_id),
        });
    }

    let organization_id = organization.ok_or_else(|| {
        CliError::InvalidArgument("--organization is required without --job".to_string())
    })?;
    Ok(Invocation {
        connection: StoreConnection::from_env()?,
        organization_id,
        user_id: user.unwrap_or_else(|| DEFAULT_USER_ID.to_string()),
    })
}

pub fn read_job_request(path: &Path) -> Result<JobRequest, CliError> {
    let raw = fs::read_to_string(path).map_err(|source| CliError::JobFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&raw)?)
}

fn normalize_identifier(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

pub fn resolve_db_path(explicit: Option<PathBuf>, settings: &SyncSettings) -> PathBuf {
    explicit.unwrap_or_else(|| settings.db_path.clone())
}

/// Open the local store and wire it up as the audit sink of every job.
pub fn open_context(
    db_path: &Path,
    settings: &SyncSettings,
) -> Result<(Arc<SqliteDocumentStore>, JobContext), CliError> {
    let store = Arc::new(SqliteDocumentStore::open(db_path)?);
    let audit = SyncAuditLogger::new(store.clone());
    let context = JobContext::new(store.clone(), audit, settings.clone());
    Ok((store, context))
}

/// Cancel the given jobs on Ctrl-C. Abort the returned task once they finish.
pub fn cancel_on_interrupt(tokens: Vec<CancellationToken>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!(jobs = tokens.len(), "Interrupted, cancelling sync jobs");
            for token in tokens {
                token.cancel();
            }
        }
    })
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn format_timestamp(unix_ms: i64) -> String {
    DateTime::from_timestamp_millis(unix_ms).map_or_else(
        || unix_ms.to_string(),
        |time| time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_audit_line(event: &AuditEvent) -> String {
    let mut line = format!(
        "{}  {:<6} {:<8} {:<9} store={}",
        format_timestamp(event.recorded_at),
        event.operation.as_str(),
        event.entity_type.as_str(),
        event.status.as_str(),
        event.store_id,
    );
    if let Some(entity_id) = &event.entity_id {
        line.push_str(&format!(" record={entity_id}"));
    }
    if let Some(remote_id) = event.remote_id {
        line.push_str(&format!(" remote={remote_id}"));
    }
    line.push_str(&format!(" user={}", event.user_id));
    if let Some(error) = &event.error {
        line.push_str(&format!(" error={error:?}"));
    }
    line
}

//! Isolated job execution.
//!
//! Every job gets its own task, HTTP client, cancellation token and
//! wall-clock limit. Its terminal outcome comes back through the task handle.

use std::fmt;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{PullJob, PushJob, PushRequest};
use crate::audit::{AuditEvent, AuditOperation, AuditStatus, SyncAuditLogger};
use crate::config::{StoreConnection, SyncSettings};
use crate::mapper::{CustomerMapper, OrderMapper, ProductMapper};
use crate::models::{EntityType, JobOutcome, PushReceipt, SyncJobSpec, SyncResult};
use crate::remote::{
    ClassifiedError, ClientOptions, ErrorType, RateLimitedExecutor, RemoteClient, RetryPolicy,
};
use crate::store::DocumentStore;

/// Collaborators shared by all jobs of one process.
#[derive(Clone)]
pub struct JobContext {
    pub store: Arc<dyn DocumentStore>,
    pub audit: SyncAuditLogger,
    pub settings: SyncSettings,
    pub retry: RetryPolicy,
}

impl fmt::Debug for JobContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobContext")
            .field("settings", &self.settings)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl JobContext {
    pub fn new(store: Arc<dyn DocumentStore>, audit: SyncAuditLogger, settings: SyncSettings) -> Self {
        Self {
            store,
            audit,
            settings,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Handle to a spawned job.
#[derive(Debug)]
pub struct JobHandle<T> {
    cancel: CancellationToken,
    handle: JoinHandle<JobOutcome<T>>,
}

impl<T> JobHandle<T> {
    /// Ask the job to stop at its next page or record boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub const fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Wait for the job's terminal outcome.
    pub async fn wait(self) -> JobOutcome<T> {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::error!(%error, "Sync job task did not complete");
                ClassifiedError::new(ErrorType::Unknown, format!("sync job task failed: {error}"))
                    .into()
            }
        }
    }
}

pub fn spawn_pull(
    context: JobContext,
    connection: StoreConnection,
    spec: SyncJobSpec,
) -> JobHandle<SyncResult> {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let handle =
        tokio::spawn(async move { run_pull(&context, &connection, spec, token).await });
    JobHandle { cancel, handle }
}

pub fn spawn_push(
    context: JobContext,
    connection: StoreConnection,
    request: PushRequest,
) -> JobHandle<PushReceipt> {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let handle =
        tokio::spawn(async move { run_push(&context, &connection, request, token).await });
    JobHandle { cancel, handle }
}

/// Run one pull job to completion on the current task.
pub async fn run_pull(
    context: &JobContext,
    connection: &StoreConnection,
    spec: SyncJobSpec,
    cancel: CancellationToken,
) -> JobOutcome {
    let client = match connect(context, connection) {
        Ok(client) => client,
        Err(error) => return reject(context, &spec, AuditOperation::Pull, None, error),
    };

    let executor = RateLimitedExecutor::new(context.retry, cancel.clone());
    let mut job = PullJob::new(spec.clone(), context.store.clone(), context.audit.clone());
    let run = async {
        match spec.entity_type {
            EntityType::Product => job.run::<ProductMapper, _>(&client, &executor).await,
            EntityType::Customer => job.run::<CustomerMapper, _>(&client, &executor).await,
            EntityType::Order => job.run::<OrderMapper, _>(&client, &executor).await,
        }
    };

    match tokio::time::timeout(context.settings.job_timeout, run).await {
        Ok(outcome) => outcome,
        Err(_) => {
            cancel.cancel();
            timed_out(context, &spec, AuditOperation::Pull, None)
        }
    }
}

/// Run one push job to completion on the current task.
pub async fn run_push(
    context: &JobContext,
    connection: &StoreConnection,
    request: PushRequest,
    cancel: CancellationToken,
) -> JobOutcome<PushReceipt> {
    let operation = AuditOperation::from(request.operation);
    let entity_id = Some(request.record_id.as_str());
    let client = match connect(context, connection) {
        Ok(client) => client,
        Err(error) => return reject(context, &request.job, operation, entity_id, error),
    };

    let spec = request.job.clone();
    let executor = RateLimitedExecutor::new(context.retry, cancel.clone());
    let job = PushJob::new(request, context.store.clone(), context.audit.clone());
    let run = async {
        match spec.entity_type {
            EntityType::Product => job.run::<ProductMapper>(&client, &executor).await,
            EntityType::Customer => job.run::<CustomerMapper>(&client, &executor).await,
            EntityType::Order => job.run::<OrderMapper>(&client, &executor).await,
        }
    };

    match tokio::time::timeout(context.settings.job_timeout, run).await {
        Ok(outcome) => outcome,
        Err(_) => {
            cancel.cancel();
            timed_out(context, &spec, operation, entity_id)
        }
    }
}

/// Build the job's client; disabled stores are refused before any network call.
fn connect(context: &JobContext, connection: &StoreConnection) -> Result<RemoteClient, ClassifiedError> {
    if !connection.active {
        return Err(ClassifiedError::new(
            ErrorType::PermissionError,
            format!("store {} is disabled", connection.store_id),
        ));
    }
    RemoteClient::for_store(connection, &ClientOptions::from(&context.settings))
        .map_err(|error| ClassifiedError::from_remote(&error))
}

fn reject<T>(
    context: &JobContext,
    spec: &SyncJobSpec,
    operation: AuditOperation,
    entity_id: Option<String>,
    error: ClassifiedError,
) -> JobOutcome<T> {
    tracing::error!(
        store_id = %spec.store_id,
        entity_type = %spec.entity_type,
        operation = %operation,
        error_type = %error.error_type,
        details = %error.technical_details,
        "Sync job rejected before start"
    );
    let mut event = AuditEvent::new(operation, spec, AuditStatus::Failed)
        .with_error(error.technical_details.clone());
    event.entity_id = entity_id;
    context.audit.log(&event);
    error.into()
}

fn timed_out<T>(
    context: &JobContext,
    spec: &SyncJobSpec,
    operation: AuditOperation,
    entity_id: Option<String>,
) -> JobOutcome<T> {
    let error = ClassifiedError::new(
        ErrorType::Timeout,
        format!(
            "sync job exceeded its {}s time limit",
            context.settings.job_timeout.as_secs()
        ),
    );
    tracing::error!(
        store_id = %spec.store_id,
        entity_type = %spec.entity_type,
        operation = %operation,
        "Sync job timed out"
    );
    let mut event = AuditEvent::new(operation, spec, AuditStatus::Failed)
        .with_error(error.technical_details.clone());
    event.entity_id = entity_id;
    context.audit.log(&event);
    error.into()
}

//! Pull direction: remote collection into local records.

use std::sync::Arc;

use serde_json::Value;

use crate::audit::{AuditEvent, AuditOperation, AuditStatus, SyncAuditLogger};
use crate::error::{Error, Result};
use crate::mapper::EntityMapper;
use crate::models::{JobOutcome, JobState, LocalRecord, Scope, SyncJobSpec, SyncResult};
use crate::reconcile::{EntityReconciler, Match};
use crate::remote::{
    fetch_all, ClassifiedError, ErrorType, PageSource, RateLimitedExecutor, RemoteError,
};
use crate::store::{DocumentStore, Filter};
use crate::util::unix_millis_now;

/// One store × entity-type pull. Records are processed one at a time and a
/// failing record never aborts the rest.
pub struct PullJob {
    spec: SyncJobSpec,
    scope: Scope,
    store: Arc<dyn DocumentStore>,
    audit: SyncAuditLogger,
    state: JobState,
    result: SyncResult,
}

impl PullJob {
    pub fn new(spec: SyncJobSpec, store: Arc<dyn DocumentStore>, audit: SyncAuditLogger) -> Self {
        Self {
            scope: spec.scope(),
            spec,
            store,
            audit,
            state: JobState::Idle,
            result: SyncResult::default(),
        }
    }

    pub const fn state(&self) -> JobState {
        self.state
    }

    /// Tallies so far; final once the job has terminated.
    pub const fn progress(&self) -> SyncResult {
        self.result
    }

    pub async fn run<M, S>(&mut self, source: &S, executor: &RateLimitedExecutor) -> JobOutcome
    where
        M: EntityMapper,
        S: PageSource,
    {
        if M::ENTITY != self.spec.entity_type {
            return self.fail(ClassifiedError::new(
                ErrorType::Unknown,
                format!(
                    "{} mapper cannot run a {} job",
                    M::ENTITY,
                    self.spec.entity_type
                ),
            ));
        }

        tracing::info!(
            store_id = %self.spec.store_id,
            organization_id = %self.spec.organization_id,
            entity_type = %M::ENTITY,
            "Starting pull job"
        );
        self.transition(JobState::Fetching);

        let remote = match fetch_all(source, executor, M::ENTITY).await {
            Ok(records) => records,
            Err(RemoteError::Cancelled) => return self.cancel(),
            Err(error) => return self.fail(ClassifiedError::from_remote(&error)),
        };

        self.result.total = remote.len();
        self.transition(JobState::Reconciling);

        for value in remote {
            if executor.is_cancelled() {
                return self.cancel();
            }
            self.process::<M>(value);
        }

        self.succeed()
    }

    fn transition(&mut self, next: JobState) {
        tracing::debug!(
            store_id = %self.spec.store_id,
            entity_type = %self.spec.entity_type,
            from = ?self.state,
            to = ?next,
            "Pull job state change"
        );
        self.state = next;
    }

    fn process<M: EntityMapper>(&mut self, value: Value) {
        let remote: M::Remote = match serde_json::from_value(value) {
            Ok(remote) => remote,
            Err(error) => {
                self.result.skipped += 1;
                tracing::warn!(
                    %error,
                    store_id = %self.spec.store_id,
                    entity_type = %M::ENTITY,
                    "Skipping remote record that could not be decoded"
                );
                return;
            }
        };

        let remote_id = M::remote_id(&remote);
        let natural_key = M::remote_natural_key(&remote);
        let reconciler = EntityReconciler::new(self.store.as_ref(), &self.scope);
        let matched = match reconciler.reconcile(M::ENTITY, remote_id, natural_key.as_deref()) {
            Ok(matched) => matched,
            Err(error) => {
                self.record_failure(remote_id, None, &error);
                return;
            }
        };

        match self.persist::<M>(&remote, remote_id, natural_key, matched.as_ref()) {
            Ok(true) => self.result.created += 1,
            Ok(false) => self.result.updated += 1,
            Err(error) => self.record_failure(remote_id, matched.map(|hit| hit.record), &error),
        }
    }

    /// Write one remote record; `true` when a local record was created.
    fn persist<M: EntityMapper>(
        &self,
        remote: &M::Remote,
        remote_id: i64,
        natural_key: Option<String>,
        matched: Option<&Match>,
    ) -> Result<bool> {
        let now = unix_millis_now();
        let local = M::to_local(remote);

        let Some(hit) = matched else {
            let mut record = LocalRecord::new(M::ENTITY, self.scope.clone(), &local)?
                .with_external_id(remote_id)
                .with_natural_key(natural_key);
            record.mark_synced(now);
            self.store.create(M::ENTITY, &self.scope, &record)?;
            return Ok(true);
        };

        let mut record = hit.record.clone();
        record.external_id = Some(remote_id);
        record.natural_key = natural_key;
        record.data = serde_json::to_value(&local)?;
        record.mark_synced(now);

        tracing::trace!(remote_id, record_id = %record.id, tier = %hit.tier, "Updating matched record");
        let upserted =
            self.store
                .find_one_and_upsert(M::ENTITY, &self.scope, &Filter::Id(record.id), &record)?;
        Ok(upserted.is_created())
    }

    fn record_failure(&mut self, remote_id: i64, matched: Option<LocalRecord>, error: &Error) {
        self.result.failed += 1;
        tracing::warn!(
            %error,
            remote_id,
            store_id = %self.spec.store_id,
            organization_id = %self.spec.organization_id,
            entity_type = %self.spec.entity_type,
            "Failed to sync remote record"
        );

        let Some(mut record) = matched else {
            return;
        };
        record.mark_failed(error.to_string(), unix_millis_now());
        if let Err(mark_error) = self.store.find_one_and_upsert(
            self.spec.entity_type,
            &self.scope,
            &Filter::Id(record.id),
            &record,
        ) {
            tracing::warn!(
                error = %mark_error,
                record_id = %record.id,
                "Failed to mark local record as failed"
            );
        }
    }

    fn succeed(&mut self) -> JobOutcome {
        self.transition(JobState::Terminated);
        let result = self.result;
        tracing::info!(
            store_id = %self.spec.store_id,
            entity_type = %self.spec.entity_type,
            total = result.total,
            created = result.created,
            updated = result.updated,
            failed = result.failed,
            skipped = result.skipped,
            "Pull job finished"
        );
        self.audit.log(&AuditEvent::new(
            AuditOperation::Pull,
            &self.spec,
            AuditStatus::Success,
        ));

        JobOutcome::success(
            format!(
                "Synced {} {}: {} created, {} updated, {} failed, {} skipped",
                result.total,
                self.spec.entity_type.remote_path(),
                result.created,
                result.updated,
                result.failed,
                result.skipped
            ),
            result,
        )
    }

    fn fail(&mut self, error: ClassifiedError) -> JobOutcome {
        self.transition(JobState::Terminated);
        tracing::error!(
            store_id = %self.spec.store_id,
            entity_type = %self.spec.entity_type,
            error_type = %error.error_type,
            retryable = error.retryable,
            details = %error.technical_details,
            "Pull job failed"
        );
        self.audit.log(
            &AuditEvent::new(AuditOperation::Pull, &self.spec, AuditStatus::Failed)
                .with_error(error.technical_details.clone()),
        );
        error.into()
    }

    fn cancel(&mut self) -> JobOutcome {
        self.transition(JobState::Terminated);
        tracing::info!(
            store_id = %self.spec.store_id,
            entity_type = %self.spec.entity_type,
            processed = self.result.processed(),
            "Pull job cancelled"
        );
        self.audit.log(&AuditEvent::new(
            AuditOperation::Pull,
            &self.spec,
            AuditStatus::Cancelled,
        ));
        JobOutcome::cancelled(self.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::{CustomerMapper, ProductMapper};
    use crate::models::{EntityType, SyncStatus};
    use crate::store::{SqliteDocumentStore, Upserted};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::future::Future;
    use tokio_util::sync::CancellationToken;

    struct StaticSource(Vec<Value>);

    impl PageSource for StaticSource {
        fn fetch_page(
            &self,
            _entity: EntityType,
            page: u32,
            per_page: u32,
        ) -> impl Future<Output = std::result::Result<Vec<Value>, RemoteError>> + Send {
            let start = ((page - 1) * per_page) as usize;
            let items = self
                .0
                .iter()
                .skip(start)
                .take(per_page as usize)
                .cloned()
                .collect();
            std::future::ready(Ok(items))
        }
    }

    struct FailingSource;

    impl PageSource for FailingSource {
        fn fetch_page(
            &self,
            _entity: EntityType,
            _page: u32,
            _per_page: u32,
        ) -> impl Future<Output = std::result::Result<Vec<Value>, RemoteError>> + Send {
            std::future::ready(Err(RemoteError::Status {
                status: 401,
                body: "consumer key is invalid".to_string(),
            }))
        }
    }

    /// Rejects writes of one natural key.
    struct FlakyStore {
        inner: SqliteDocumentStore,
        poisoned_key: &'static str,
    }

    impl FlakyStore {
        fn check(&self, record: &LocalRecord) -> Result<()> {
            if record.natural_key.as_deref() == Some(self.poisoned_key) {
                return Err(Error::Database("disk I/O error".to_string()));
            }
            Ok(())
        }
    }

    impl DocumentStore for FlakyStore {
        fn find_one(
            &self,
            entity: EntityType,
            scope: &Scope,
            filter: &Filter,
        ) -> Result<Option<LocalRecord>> {
            self.inner.find_one(entity, scope, filter)
        }

        fn find_one_and_upsert(
            &self,
            entity: EntityType,
            scope: &Scope,
            filter: &Filter,
            record: &LocalRecord,
        ) -> Result<Upserted> {
            self.check(record)?;
            self.inner.find_one_and_upsert(entity, scope, filter, record)
        }

        fn create(
            &self,
            entity: EntityType,
            scope: &Scope,
            record: &LocalRecord,
        ) -> Result<LocalRecord> {
            self.check(record)?;
            self.inner.create(entity, scope, record)
        }
    }

    fn products(count: i64) -> Vec<Value> {
        (1..=count)
            .map(|id| json!({"id": id, "name": format!("Product {id}"), "sku": format!("SKU-{id}")}))
            .collect()
    }

    fn spec(entity: EntityType) -> SyncJobSpec {
        SyncJobSpec::new("store-1", entity, "org-1", "user-1")
    }

    #[tokio::test]
    async fn second_run_updates_everything_it_created() {
        let store: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::open_in_memory().unwrap());
        let source = StaticSource(products(3));
        let executor = RateLimitedExecutor::default();

        let mut first = PullJob::new(spec(EntityType::Product), store.clone(), SyncAuditLogger::default());
        let outcome = first.run::<ProductMapper, _>(&source, &executor).await;
        assert_eq!(
            outcome.data(),
            Some(&SyncResult {
                total: 3,
                created: 3,
                ..SyncResult::default()
            })
        );
        assert_eq!(first.state(), JobState::Terminated);

        let mut second = PullJob::new(spec(EntityType::Product), store, SyncAuditLogger::default());
        let outcome = second.run::<ProductMapper, _>(&source, &executor).await;
        assert!(outcome.is_success());
        assert_eq!(
            outcome.data(),
            Some(&SyncResult {
                total: 3,
                updated: 3,
                ..SyncResult::default()
            })
        );
    }

    #[tokio::test]
    async fn one_failing_record_does_not_abort_the_job() {
        let store = Arc::new(FlakyStore {
            inner: SqliteDocumentStore::open_in_memory().unwrap(),
            poisoned_key: "SKU-5",
        });
        let source = StaticSource(products(10));

        let mut job = PullJob::new(spec(EntityType::Product), store, SyncAuditLogger::default());
        let outcome = job
            .run::<ProductMapper, _>(&source, &RateLimitedExecutor::default())
            .await;

        assert!(outcome.is_success());
        let result = outcome.data().copied().unwrap();
        assert_eq!(result.failed, 1);
        assert_eq!(result.created + result.updated, 9);
    }

    #[tokio::test]
    async fn failed_update_marks_matched_record() {
        let inner = SqliteDocumentStore::open_in_memory().unwrap();
        let scope = Scope::new("org-1", "store-1");
        let mut existing =
            LocalRecord::new(EntityType::Product, scope.clone(), &json!({"name": "Old"}))
                .unwrap()
                .with_external_id(5)
                .with_natural_key(Some("SKU-OLD".to_string()));
        existing.mark_synced(1);
        inner.create(EntityType::Product, &scope, &existing).unwrap();

        let store = Arc::new(FlakyStore {
            inner,
            poisoned_key: "SKU-5",
        });
        let mut job = PullJob::new(spec(EntityType::Product), store.clone(), SyncAuditLogger::default());
        let outcome = job
            .run::<ProductMapper, _>(&StaticSource(products(5)), &RateLimitedExecutor::default())
            .await;
        assert_eq!(outcome.data().map(|r| r.failed), Some(1));

        let marked = store
            .find_one(EntityType::Product, &scope, &Filter::Id(existing.id))
            .unwrap()
            .unwrap();
        assert_eq!(marked.sync_status, SyncStatus::Failed);
        assert!(marked.sync_error.unwrap().contains("disk I/O error"));
        assert_eq!(marked.last_synced_at, Some(1));
    }

    #[tokio::test]
    async fn undecodable_records_are_skipped() {
        let store: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::open_in_memory().unwrap());
        let source = StaticSource(vec![
            json!({"id": 1, "email": "a@example.com"}),
            json!({"email": "no-id@example.com"}),
        ]);

        let mut job = PullJob::new(spec(EntityType::Customer), store, SyncAuditLogger::default());
        let outcome = job
            .run::<CustomerMapper, _>(&source, &RateLimitedExecutor::default())
            .await;

        assert_eq!(
            outcome.data(),
            Some(&SyncResult {
                total: 2,
                created: 1,
                skipped: 1,
                ..SyncResult::default()
            })
        );
    }

    #[tokio::test]
    async fn fetch_failure_is_classified_and_fatal() {
        let store: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::open_in_memory().unwrap());
        let mut job = PullJob::new(spec(EntityType::Product), store, SyncAuditLogger::default());
        let outcome = job
            .run::<ProductMapper, _>(&FailingSource, &RateLimitedExecutor::default())
            .await;

        assert_eq!(outcome.error_type(), Some(ErrorType::AuthError));
        assert_eq!(job.state(), JobState::Terminated);
    }

    #[tokio::test]
    async fn cancelled_before_start_reports_cancelled() {
        let store: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::open_in_memory().unwrap());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let executor = RateLimitedExecutor::new(Default::default(), cancel);

        let mut job = PullJob::new(spec(EntityType::Product), store, SyncAuditLogger::default());
        let outcome = job
            .run::<ProductMapper, _>(&StaticSource(products(2)), &executor)
            .await;

        assert!(matches!(outcome, JobOutcome::Cancelled { .. }));
        assert_eq!(outcome.data(), Some(&SyncResult::default()));
    }

    #[tokio::test]
    async fn mapper_must_match_job_entity() {
        let store: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::open_in_memory().unwrap());
        let mut job = PullJob::new(spec(EntityType::Order), store, SyncAuditLogger::default());
        let outcome = job
            .run::<ProductMapper, _>(&StaticSource(Vec::new()), &RateLimitedExecutor::default())
            .await;
        assert_eq!(outcome.error_type(), Some(ErrorType::Unknown));
    }
}

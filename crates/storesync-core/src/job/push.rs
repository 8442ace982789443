//! Push direction: one local record to the remote store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::audit::{AuditEvent, AuditStatus, SyncAuditLogger};
use crate::error::Error;
use crate::mapper::EntityMapper;
use crate::models::{
    JobOutcome, LocalRecord, PushOperation, PushReceipt, RecordId, Scope, SyncJobSpec,
};
use crate::remote::{ClassifiedError, ErrorType, RateLimitedExecutor, RemoteClient, RemoteError};
use crate::store::{DocumentStore, Filter};
use crate::util::unix_millis_now;

/// A single create, update, or delete of one local record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    pub job: SyncJobSpec,
    pub operation: PushOperation,
    pub record_id: RecordId,
}

enum PushError {
    NotLinked,
    Local(Error),
    Remote(RemoteError),
}

impl From<RemoteError> for PushError {
    fn from(error: RemoteError) -> Self {
        Self::Remote(error)
    }
}

impl From<Error> for PushError {
    fn from(error: Error) -> Self {
        Self::Local(error)
    }
}

pub struct PushJob {
    request: PushRequest,
    scope: Scope,
    store: Arc<dyn DocumentStore>,
    audit: SyncAuditLogger,
}

impl PushJob {
    pub fn new(request: PushRequest, store: Arc<dyn DocumentStore>, audit: SyncAuditLogger) -> Self {
        Self {
            scope: request.job.scope(),
            request,
            store,
            audit,
        }
    }

    pub const fn request(&self) -> &PushRequest {
        &self.request
    }

    pub async fn run<M: EntityMapper>(
        &self,
        client: &RemoteClient,
        executor: &RateLimitedExecutor,
    ) -> JobOutcome<PushReceipt> {
        let entity = self.request.job.entity_type;
        if M::ENTITY != entity {
            return self.fail(
                None,
                ClassifiedError::new(
                    ErrorType::Unknown,
                    format!("{} mapper cannot push a {entity} record", M::ENTITY),
                ),
            );
        }

        let record = match self
            .store
            .find_one(entity, &self.scope, &Filter::Id(self.request.record_id))
        {
            Ok(Some(record)) => record,
            Ok(None) => {
                return self.fail(
                    None,
                    ClassifiedError::new(
                        ErrorType::NotFound,
                        format!(
                            "local {entity} {} not found in {}",
                            self.request.record_id, self.scope
                        ),
                    ),
                )
            }
            Err(error) => {
                return self.fail(None, ClassifiedError::new(ErrorType::Unknown, error.to_string()))
            }
        };

        tracing::info!(
            operation = self.request.operation.as_str(),
            entity_type = %entity,
            record_id = %record.id,
            external_id = record.external_id,
            store_id = %self.scope.store_id,
            "Pushing record to remote store"
        );

        match self.send::<M>(&record, client, executor).await {
            Ok(remote_id) => self.succeed::<M>(record, remote_id),
            Err(PushError::Remote(RemoteError::Cancelled)) => {
                tracing::info!(record_id = %record.id, "Push job cancelled");
                JobOutcome::cancelled(self.receipt(record.external_id))
            }
            Err(PushError::Remote(error)) => {
                self.fail(Some(record), ClassifiedError::from_remote(&error))
            }
            Err(PushError::NotLinked) => {
                let details = format!(
                    "{entity} {} has no external id; push it with create first",
                    record.id
                );
                self.fail(Some(record), ClassifiedError::new(ErrorType::NotFound, details))
            }
            Err(PushError::Local(error)) => {
                self.fail(Some(record), ClassifiedError::new(ErrorType::Unknown, error.to_string()))
            }
        }
    }

    /// Perform the remote call; returns the remote id the record now maps to.
    async fn send<M: EntityMapper>(
        &self,
        record: &LocalRecord,
        client: &RemoteClient,
        executor: &RateLimitedExecutor,
    ) -> Result<Option<i64>, PushError> {
        let entity = M::ENTITY;
        let label = format!("{} {}", self.request.operation.as_str(), entity.remote_path());

        match self.request.operation {
            PushOperation::Create => {
                let payload = M::to_payload(&record.decode::<M::Local>()?);
                let response = executor
                    .execute(&label, || client.create(entity, &payload))
                    .await?;
                Ok(Some(response_id(&response)?))
            }
            PushOperation::Update => {
                let external_id = record.external_id.ok_or(PushError::NotLinked)?;
                let payload = M::to_payload(&record.decode::<M::Local>()?);
                executor
                    .execute(&label, || client.update(entity, external_id, &payload))
                    .await?;
                Ok(Some(external_id))
            }
            PushOperation::Delete => {
                let external_id = record.external_id.ok_or(PushError::NotLinked)?;
                executor
                    .execute(&label, || client.delete(entity, external_id))
                    .await?;
                Ok(None)
            }
        }
    }

    fn receipt(&self, remote_id: Option<i64>) -> PushReceipt {
        PushReceipt {
            operation: self.request.operation,
            record_id: self.request.record_id,
            remote_id,
        }
    }

    fn event(&self, status: AuditStatus) -> AuditEvent {
        AuditEvent::new(self.request.operation.into(), &self.request.job, status)
            .with_entity_id(self.request.record_id.as_str())
    }

    fn succeed<M: EntityMapper>(
        &self,
        mut record: LocalRecord,
        remote_id: Option<i64>,
    ) -> JobOutcome<PushReceipt> {
        let previous_remote_id = record.external_id;
        record.external_id = remote_id;
        if self.request.operation != PushOperation::Delete {
            if let Ok(local) = record.decode::<M::Local>() {
                record.natural_key = M::local_natural_key(&local);
            }
        }
        record.mark_synced(unix_millis_now());

        if let Err(error) = self.store.find_one_and_upsert(
            record.entity_type,
            &self.scope,
            &Filter::Id(record.id),
            &record,
        ) {
            let details = format!(
                "remote {} succeeded but saving the local record failed: {error}",
                self.request.operation.as_str()
            );
            return self.fail(None, ClassifiedError::new(ErrorType::Unknown, details));
        }

        let audited_remote_id = remote_id.or(previous_remote_id);
        self.audit
            .log(&self.event(AuditStatus::Success).with_remote_id(audited_remote_id));

        let entity = self.request.job.entity_type;
        let message = match (self.request.operation, audited_remote_id) {
            (PushOperation::Create, Some(id)) => format!("Created {entity} as remote #{id}"),
            (PushOperation::Update, Some(id)) => format!("Updated remote {entity} #{id}"),
            (PushOperation::Delete, Some(id)) => format!("Deleted remote {entity} #{id}"),
            (operation, None) => format!("Pushed {entity} ({})", operation.as_str()),
        };
        JobOutcome::success(message, self.receipt(remote_id))
    }

    fn fail(&self, record: Option<LocalRecord>, error: ClassifiedError) -> JobOutcome<PushReceipt> {
        tracing::error!(
            operation = self.request.operation.as_str(),
            record_id = %self.request.record_id,
            store_id = %self.scope.store_id,
            error_type = %error.error_type,
            details = %error.technical_details,
            "Push job failed"
        );

        let remote_id = record.as_ref().and_then(|record| record.external_id);
        if let Some(mut record) = record {
            record.mark_failed(error.technical_details.clone(), unix_millis_now());
            if let Err(mark_error) = self.store.find_one_and_upsert(
                record.entity_type,
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

        self.audit.log(
            &self
                .event(AuditStatus::Failed)
                .with_error(error.technical_details.clone())
                .with_remote_id(remote_id),
        );
        error.into()
    }
}

fn response_id(response: &Value) -> Result<i64, RemoteError> {
    response
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| RemoteError::Decode("response has no numeric id".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_id_requires_numeric_id() {
        assert_eq!(response_id(&json!({"id": 31})).unwrap(), 31);
        assert!(matches!(
            response_id(&json!({"id": "31"})),
            Err(RemoteError::Decode(_))
        ));
        assert!(response_id(&json!([])).is_err());
    }

    #[test]
    fn push_request_uses_camel_case() {
        let request: PushRequest = serde_json::from_value(json!({
            "job": {"storeId": "s1", "entityType": "product", "organizationId": "o1", "userId": "u1"},
            "operation": "delete",
            "recordId": "0190b6c4-1c1e-7cc3-a3b1-3f5b8f0e2a10"
        }))
        .unwrap();
        assert_eq!(request.operation, PushOperation::Delete);
        assert_eq!(request.job.scope(), Scope::new("o1", "s1"));
    }
}

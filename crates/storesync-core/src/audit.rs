//! Structured audit trail of completed sync operations.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{EntityType, PushOperation, SyncJobSpec};
use crate::util::unix_millis_now;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOperation {
    Pull,
    Create,
    Update,
    Delete,
}

impl AuditOperation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pull => "pull",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl From<PushOperation> for AuditOperation {
    fn from(operation: PushOperation) -> Self {
        match operation {
            PushOperation::Create => Self::Create,
            PushOperation::Update => Self::Update,
            PushOperation::Delete => Self::Delete,
        }
    }
}

impl FromStr for AuditOperation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pull" => Ok(Self::Pull),
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(format!("unknown audit operation: {other}")),
        }
    }
}

impl fmt::Display for AuditOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Success,
    Failed,
    Cancelled,
}

impl AuditStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl FromStr for AuditStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown audit status: {other}")),
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One completed push or pull operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub operation: AuditOperation,
    pub entity_type: EntityType,
    /// Local record id for pushes; absent for whole-collection pulls
    pub entity_id: Option<String>,
    pub store_id: String,
    pub status: AuditStatus,
    pub user_id: String,
    pub organization_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<i64>,
    /// Unix ms
    pub recorded_at: i64,
}

impl AuditEvent {
    pub fn new(operation: AuditOperation, job: &SyncJobSpec, status: AuditStatus) -> Self {
        Self {
            operation,
            entity_type: job.entity_type,
            entity_id: None,
            store_id: job.store_id.clone(),
            status,
            user_id: job.user_id.clone(),
            organization_id: job.organization_id.clone(),
            error: None,
            remote_id: None,
            recorded_at: unix_millis_now(),
        }
    }

    #[must_use]
    pub fn with_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    #[must_use]
    pub const fn with_remote_id(mut self, remote_id: Option<i64>) -> Self {
        self.remote_id = remote_id;
        self
    }
}

/// Destination for audit events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent) -> Result<()>;
}

/// Keeps nothing; events only reach the `tracing` mirror.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, _event: &AuditEvent) -> Result<()> {
        Ok(())
    }
}

/// Writes audit events to a sink and mirrors them as `tracing` events.
///
/// Sink failures are logged and never surface to the caller.
#[derive(Clone)]
pub struct SyncAuditLogger {
    sink: Arc<dyn AuditSink>,
}

impl fmt::Debug for SyncAuditLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncAuditLogger").finish_non_exhaustive()
    }
}

impl Default for SyncAuditLogger {
    fn default() -> Self {
        Self::tracing_only()
    }
}

impl SyncAuditLogger {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    pub fn tracing_only() -> Self {
        Self::new(Arc::new(TracingAuditSink))
    }

    pub fn log(&self, event: &AuditEvent) {
        tracing::info!(
            target: "storesync::audit",
            operation = %event.operation,
            entity_type = %event.entity_type,
            entity_id = event.entity_id.as_deref(),
            store_id = %event.store_id,
            organization_id = %event.organization_id,
            user_id = %event.user_id,
            status = %event.status,
            remote_id = event.remote_id,
            error = event.error.as_deref(),
            "Sync operation completed"
        );

        if let Err(error) = self.sink.record(event) {
            tracing::warn!(
                %error,
                operation = %event.operation,
                store_id = %event.store_id,
                "Failed to record sync audit event"
            );
        }
    }
}

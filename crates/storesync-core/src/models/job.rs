//! Job inputs, lifecycle state, and terminal outputs

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{EntityType, RecordId, Scope};
use crate::config::{ConfigError, StoreConnection, TlsPolicy};
use crate::remote::{ClassifiedError, ErrorType, Severity};

/// What one isolated job should synchronize, and on whose behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncJobSpec {
    pub store_id: String,
    pub entity_type: EntityType,
    pub organization_id: String,
    pub user_id: String,
}

impl SyncJobSpec {
    pub fn new(
        store_id: impl Into<String>,
        entity_type: EntityType,
        organization_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            store_id: store_id.into(),
            entity_type,
            organization_id: organization_id.into(),
            user_id: user_id.into(),
        }
    }

    pub fn scope(&self) -> Scope {
        Scope::new(&self.organization_id, &self.store_id)
    }
}

/// Store credentials block of a job invocation.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreCredentials {
    pub url: String,
    pub api_key: String,
    pub secret_key: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub insecure_tls: bool,
}

const fn default_active() -> bool {
    true
}

impl fmt::Debug for StoreCredentials {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("StoreCredentials")
            .field("url", &self.url)
            .field("api_key", &self.api_key)
            .field("secret_key", &"[REDACTED]")
            .field("active", &self.active)
            .field("insecure_tls", &self.insecure_tls)
            .finish()
    }
}

/// Job invocation input as handed over by an orchestrator.
///
/// ```json
/// {"storeId": "s1", "store": {"url": "...", "apiKey": "...", "secretKey": "..."},
///  "organizationId": "org", "userId": "u1"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub store_id: String,
    pub store: StoreCredentials,
    pub organization_id: String,
    pub user_id: String,
}

impl JobRequest {
    pub fn connection(&self) -> Result<StoreConnection, ConfigError> {
        Ok(StoreConnection::new(
            &self.store_id,
            &self.store.url,
            &self.store.api_key,
            &self.store.secret_key,
        )?
        .with_active(self.store.active)
        .with_tls(TlsPolicy::from_insecure_flag(self.store.insecure_tls)))
    }

    pub fn spec(&self, entity_type: EntityType) -> SyncJobSpec {
        SyncJobSpec::new(
            &self.store_id,
            entity_type,
            &self.organization_id,
            &self.user_id,
        )
    }
}

/// Outcome tallies for one pull job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl SyncResult {
    /// Records handled so far, in any way.
    pub const fn processed(&self) -> usize {
        self.created + self.updated + self.failed + self.skipped
    }
}

/// Direction-specific operation of a push job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushOperation {
    Create,
    Update,
    Delete,
}

impl PushOperation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// What a push job did to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushReceipt {
    pub operation: PushOperation,
    pub record_id: RecordId,
    pub remote_id: Option<i64>,
}

/// Lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Fetching,
    Reconciling,
    Terminated,
}

/// The single terminal message a job hands back to its orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobOutcome<D = SyncResult> {
    Success {
        message: String,
        data: D,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        message: String,
        error_type: ErrorType,
        suggestions: Vec<String>,
        technical_details: String,
        severity: Severity,
        retryable: bool,
    },
    /// Stopped by its cancellation token; `data` holds the progress made.
    Cancelled {
        message: String,
        data: D,
    },
}

impl<D> JobOutcome<D> {
    pub fn success(message: impl Into<String>, data: D) -> Self {
        Self::Success {
            message: message.into(),
            data,
        }
    }

    pub fn cancelled(data: D) -> Self {
        Self::Cancelled {
            message: "Sync job was cancelled before completion".to_string(),
            data,
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub const fn error_type(&self) -> Option<ErrorType> {
        match self {
            Self::Error { error_type, .. } => Some(*error_type),
            _ => None,
        }
    }

    pub const fn data(&self) -> Option<&D> {
        match self {
            Self::Success { data, .. } | Self::Cancelled { data, .. } => Some(data),
            Self::Error { .. } => None,
        }
    }
}

impl<D> From<ClassifiedError> for JobOutcome<D> {
    fn from(error: ClassifiedError) -> Self {
        Self::Error {
            message: error.user_friendly_message,
            error_type: error.error_type,
            suggestions: error.suggested_actions,
            technical_details: error.technical_details,
            severity: error.severity,
            retryable: error.retryable,
        }
    }
}

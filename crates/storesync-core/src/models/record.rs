//! Local record envelope stored by the document store

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{EntityType, Scope};
use crate::Result;

/// A unique identifier for a local record, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Create a new unique record ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Outcome of the most recent sync attempt for a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Created locally and never pushed
    #[default]
    Pending,
    Synced,
    Failed,
}

impl SyncStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "synced" => Ok(Self::Synced),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown sync status: {other}")),
        }
    }
}

/// A locally stored entity plus its sync metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalRecord {
    pub id: RecordId,
    pub entity_type: EntityType,
    pub scope: Scope,
    /// Remote platform id; the primary reconciliation key once known
    pub external_id: Option<i64>,
    /// Identifier carried over from data imported before external ids existed
    pub legacy_id: Option<String>,
    /// SKU, email, or order key depending on the entity type
    pub natural_key: Option<String>,
    /// Entity fields (`LocalProduct`, `LocalCustomer`, or `LocalOrder`)
    pub data: serde_json::Value,
    pub sync_status: SyncStatus,
    pub sync_error: Option<String>,
    /// Last successful sync (Unix ms)
    pub last_synced_at: Option<i64>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl LocalRecord {
    /// Create a pending record from typed entity data.
    pub fn new<T: Serialize>(entity_type: EntityType, scope: Scope, data: &T) -> Result<Self> {
        let now = chrono::Utc::now().timestamp_millis();
        Ok(Self {
            id: RecordId::new(),
            entity_type,
            scope,
            external_id: None,
            legacy_id: None,
            natural_key: None,
            data: serde_json::to_value(data)?,
            sync_status: SyncStatus::Pending,
            sync_error: None,
            last_synced_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    #[must_use]
    pub fn with_natural_key(mut self, natural_key: Option<String>) -> Self {
        self.natural_key = natural_key;
        self
    }

    #[must_use]
    pub fn with_legacy_id(mut self, legacy_id: impl Into<String>) -> Self {
        self.legacy_id = Some(legacy_id.into());
        self
    }

    #[must_use]
    pub const fn with_external_id(mut self, external_id: i64) -> Self {
        self.external_id = Some(external_id);
        self
    }

    /// Decode the entity fields into their typed local shape.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }

    /// Record a successful sync at `now` (Unix ms).
    pub fn mark_synced(&mut self, now: i64) {
        self.sync_status = SyncStatus::Synced;
        self.sync_error = None;
        self.last_synced_at = Some(now);
        self.updated_at = now;
    }

    /// Record a failed sync attempt, keeping the last successful timestamp.
    pub fn mark_failed(&mut self, message: impl Into<String>, now: i64) {
        self.sync_status = SyncStatus::Failed;
        self.sync_error = Some(message.into());
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> LocalRecord {
        LocalRecord::new(
            EntityType::Product,
            Scope::new("org-1", "store-1"),
            &json!({"name": "Mug"}),
        )
        .unwrap()
    }

    #[test]
    fn record_id_round_trips_through_string() {
        let id = RecordId::new();
        let parsed: RecordId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<RecordId>().is_err());
    }

    #[test]
    fn new_record_is_pending_and_unlinked() {
        let record = sample();
        assert_eq!(record.sync_status, SyncStatus::Pending);
        assert_eq!(record.external_id, None);
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn mark_failed_keeps_last_synced_at() {
        let mut record = sample();
        record.mark_synced(1_000);
        record.mark_failed("upsert rejected", 2_000);
        assert_eq!(record.sync_status, SyncStatus::Failed);
        assert_eq!(record.sync_error.as_deref(), Some("upsert rejected"));
        assert_eq!(record.last_synced_at, Some(1_000));
        assert_eq!(record.updated_at, 2_000);

        record.mark_synced(3_000);
        assert_eq!(record.sync_error, None);
        assert_eq!(record.last_synced_at, Some(3_000));
    }
}

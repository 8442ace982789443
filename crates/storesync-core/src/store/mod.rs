//! Local document persistence used by the sync jobs.

mod migrations;
mod sqlite;

use crate::error::Result;
use crate::models::{EntityType, LocalRecord, RecordId, Scope};

pub use sqlite::SqliteDocumentStore;

/// Single-field lookup applied within one entity type and tenant scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Id(RecordId),
    ExternalId(i64),
    LegacyId(String),
    NaturalKey(String),
}

/// Result of [`DocumentStore::find_one_and_upsert`].
#[derive(Debug, Clone, PartialEq)]
pub enum Upserted {
    Created(LocalRecord),
    Updated(LocalRecord),
}

impl Upserted {
    pub const fn record(&self) -> &LocalRecord {
        match self {
            Self::Created(record) | Self::Updated(record) => record,
        }
    }

    pub fn into_record(self) -> LocalRecord {
        match self {
            Self::Created(record) | Self::Updated(record) => record,
        }
    }

    pub const fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Local persistence collaborator.
///
/// Implementations serialize access internally; jobs share one instance.
pub trait DocumentStore: Send + Sync {
    /// First record of `entity` in `scope` matching `filter`.
    ///
    /// Legacy id and natural key lookups prefer records not yet linked to a
    /// remote id, then the oldest.
    fn find_one(&self, entity: EntityType, scope: &Scope, filter: &Filter)
        -> Result<Option<LocalRecord>>;

    /// Replace the mutable fields of the record matching `filter`, or insert
    /// `record` when nothing matches. Id, scope and `created_at` of an existing
    /// record are kept.
    fn find_one_and_upsert(
        &self,
        entity: EntityType,
        scope: &Scope,
        filter: &Filter,
        record: &LocalRecord,
    ) -> Result<Upserted>;

    /// Insert a new record.
    fn create(&self, entity: EntityType, scope: &Scope, record: &LocalRecord) -> Result<LocalRecord>;
}

pub(crate) fn ensure_record_in(entity: EntityType, scope: &Scope, record: &LocalRecord) -> Result<()> {
    if record.entity_type != entity {
        return Err(crate::Error::InvalidInput(format!(
            "record {} is a {}, not a {entity}",
            record.id, record.entity_type
        )));
    }
    if record.scope != *scope {
        return Err(crate::Error::InvalidInput(format!(
            "record {} belongs to {}, not {scope}",
            record.id, record.scope
        )));
    }
    Ok(())
}

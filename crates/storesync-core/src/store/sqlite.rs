//! `SQLite` implementation of `DocumentStore` and `AuditSink`

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use super::{ensure_record_in, migrations, DocumentStore, Filter, Upserted};
use crate::audit::{AuditEvent, AuditSink};
use crate::error::{Error, Result};
use crate::models::{EntityType, LocalRecord, Scope};

const RECORD_COLUMNS: &str = "id, entity_type, organization_id, store_id, external_id, legacy_id, \
     natural_key, data, sync_status, sync_error, last_synced_at, created_at, updated_at";

/// Document store backed by a single `SQLite` connection.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDocumentStore").finish_non_exhaustive()
    }
}

impl SqliteDocumentStore {
    /// Open the database at `path`, creating it if needed. Runs migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        conn.pragma_update(None, "foreign_keys", true)?;
        migrations::run(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("connection lock poisoned".into()))
    }

    /// Most recent audit events, newest first.
    pub fn recent_audit_events(&self, limit: usize) -> Result<Vec<AuditEvent>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT operation, entity_type, entity_id, store_id, status, user_id, organization_id,
                    error, remote_id, recorded_at
             FROM sync_audit_log
             ORDER BY recorded_at DESC, id DESC
             LIMIT ?",
        )?;
        let events = stmt
            .query_map(params![limit as i64], parse_audit_event)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }

    /// Number of records of `entity` in `scope`.
    pub fn count(&self, entity: EntityType, scope: &Scope) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sync_records
             WHERE entity_type = ?1 AND organization_id = ?2 AND store_id = ?3",
            params![entity.as_str(), scope.organization_id, scope.store_id],
            |row| row.get(0),
        )?;
        usize::try_from(count).map_err(|_| Error::Database(format!("invalid row count {count}")))
    }
}

fn find_in(
    conn: &Connection,
    entity: EntityType,
    scope: &Scope,
    filter: &Filter,
) -> Result<Option<LocalRecord>> {
    let (predicate, value): (&str, rusqlite::types::Value) = match filter {
        Filter::Id(id) => ("id = ?4", id.as_str().into()),
        Filter::ExternalId(external_id) => ("external_id = ?4", (*external_id).into()),
        Filter::LegacyId(legacy_id) => ("legacy_id = ?4", legacy_id.clone().into()),
        Filter::NaturalKey(key) => ("natural_key = ?4", key.clone().into()),
    };

    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM sync_records
         WHERE entity_type = ?1 AND organization_id = ?2 AND store_id = ?3 AND {predicate}
         ORDER BY external_id IS NULL DESC, created_at ASC
         LIMIT 1"
    );
    let record = conn
        .query_row(
            &sql,
            params![entity.as_str(), scope.organization_id, scope.store_id, value],
            parse_record,
        )
        .optional()?;
    Ok(record)
}

fn insert(conn: &Connection, record: &LocalRecord) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO sync_records ({RECORD_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
        ),
        params![
            record.id.as_str(),
            record.entity_type.as_str(),
            record.scope.organization_id,
            record.scope.store_id,
            record.external_id,
            record.legacy_id,
            record.natural_key,
            record.data,
            record.sync_status.as_str(),
            record.sync_error,
            record.last_synced_at,
            record.created_at,
            record.updated_at,
        ],
    )?;
    Ok(())
}

impl DocumentStore for SqliteDocumentStore {
    fn find_one(
        &self,
        entity: EntityType,
        scope: &Scope,
        filter: &Filter,
    ) -> Result<Option<LocalRecord>> {
        let conn = self.lock()?;
        find_in(&conn, entity, scope, filter)
    }

    fn find_one_and_upsert(
        &self,
        entity: EntityType,
        scope: &Scope,
        filter: &Filter,
        record: &LocalRecord,
    ) -> Result<Upserted> {
        ensure_record_in(entity, scope, record)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let Some(existing) = find_in(&tx, entity, scope, filter)? else {
            insert(&tx, record)?;
            tx.commit()?;
            return Ok(Upserted::Created(record.clone()));
        };

        let merged = LocalRecord {
            id: existing.id,
            entity_type: existing.entity_type,
            scope: existing.scope,
            created_at: existing.created_at,
            ..record.clone()
        };
        tx.execute(
            "UPDATE sync_records
             SET external_id = ?1, legacy_id = ?2, natural_key = ?3, data = ?4,
                 sync_status = ?5, sync_error = ?6, last_synced_at = ?7, updated_at = ?8
             WHERE id = ?9",
            params![
                merged.external_id,
                merged.legacy_id,
                merged.natural_key,
                merged.data,
                merged.sync_status.as_str(),
                merged.sync_error,
                merged.last_synced_at,
                merged.updated_at,
                merged.id.as_str(),
            ],
        )?;
        tx.commit()?;
        Ok(Upserted::Updated(merged))
    }

    fn create(&self, entity: EntityType, scope: &Scope, record: &LocalRecord) -> Result<LocalRecord> {
        ensure_record_in(entity, scope, record)?;
        let conn = self.lock()?;
        insert(&conn, record)?;
        Ok(record.clone())
    }
}

impl AuditSink for SqliteDocumentStore {
    fn record(&self, event: &AuditEvent) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sync_audit_log (
                operation, entity_type, entity_id, store_id, status, user_id,
                organization_id, error, remote_id, recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                event.operation.as_str(),
                event.entity_type.as_str(),
                event.entity_id,
                event.store_id,
                event.status.as_str(),
                event.user_id,
                event.organization_id,
                event.error,
                event.remote_id,
                event.recorded_at,
            ],
        )?;
        Ok(())
    }
}

fn conversion_error(
    index: usize,
    error: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, error.into())
}

/// Parse a record from a database row
fn parse_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<LocalRecord> {
    let id: String = row.get(0)?;
    let entity_type: String = row.get(1)?;
    let sync_status: String = row.get(8)?;
    Ok(LocalRecord {
        id: id.parse().map_err(|error| conversion_error(0, error))?,
        entity_type: entity_type
            .parse()
            .map_err(|error: String| conversion_error(1, error))?,
        scope: Scope::new(row.get::<_, String>(2)?, row.get::<_, String>(3)?),
        external_id: row.get(4)?,
        legacy_id: row.get(5)?,
        natural_key: row.get(6)?,
        data: row.get(7)?,
        sync_status: sync_status
            .parse()
            .map_err(|error: String| conversion_error(8, error))?,
        sync_error: row.get(9)?,
        last_synced_at: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn parse_audit_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditEvent> {
    let operation: String = row.get(0)?;
    let entity_type: String = row.get(1)?;
    let status: String = row.get(4)?;
    Ok(AuditEvent {
        operation: operation
            .parse()
            .map_err(|error: String| conversion_error(0, error))?,
        entity_type: entity_type
            .parse()
            .map_err(|error: String| conversion_error(1, error))?,
        entity_id: row.get(2)?,
        store_id: row.get(3)?,
        status: status
            .parse()
            .map_err(|error: String| conversion_error(4, error))?,
        user_id: row.get(5)?,
        organization_id: row.get(6)?,
        error: row.get(7)?,
        remote_id: row.get(8)?,
        recorded_at: row.get(9)?,
    })
}

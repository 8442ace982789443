//! Matching remote records to local ones.
//!
//! Tiers are tried in order and the first hit wins:
//! 1. external id
//! 2. legacy id equal to the remote id
//! 3. natural key (SKU, email, order key), when the remote record has one

use std::fmt;

use crate::error::Result;
use crate::models::{EntityType, LocalRecord, Scope};
use crate::store::{DocumentStore, Filter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    ExternalId,
    LegacyId,
    NaturalKey,
}

impl MatchTier {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExternalId => "external_id",
            Self::LegacyId => "legacy_id",
            Self::NaturalKey => "natural_key",
        }
    }
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub record: LocalRecord,
    pub tier: MatchTier,
}

/// Finds the local counterpart of remote records within one tenant scope.
pub struct EntityReconciler<'a> {
    store: &'a dyn DocumentStore,
    scope: &'a Scope,
}

impl<'a> EntityReconciler<'a> {
    pub fn new(store: &'a dyn DocumentStore, scope: &'a Scope) -> Self {
        Self { store, scope }
    }

    /// Local record for the remote entity `remote_id`, or `None` when it is new.
    ///
    /// Fallback hits already linked to a different remote id are ignored so
    /// that two remote entities never share one local record.
    pub fn reconcile(
        &self,
        entity: EntityType,
        remote_id: i64,
        natural_key: Option<&str>,
    ) -> Result<Option<Match>> {
        if let Some(record) = self.lookup(entity, &Filter::ExternalId(remote_id))? {
            return Ok(Some(Match {
                record,
                tier: MatchTier::ExternalId,
            }));
        }

        let legacy = Filter::LegacyId(remote_id.to_string());
        if let Some(record) = self.fallback(entity, &legacy, remote_id)? {
            return Ok(Some(Match {
                record,
                tier: MatchTier::LegacyId,
            }));
        }

        let Some(key) = natural_key.map(str::trim).filter(|key| !key.is_empty()) else {
            return Ok(None);
        };
        let natural = Filter::NaturalKey(key.to_string());
        Ok(self
            .fallback(entity, &natural, remote_id)?
            .map(|record| Match {
                record,
                tier: MatchTier::NaturalKey,
            }))
    }

    fn lookup(&self, entity: EntityType, filter: &Filter) -> Result<Option<LocalRecord>> {
        self.store.find_one(entity, self.scope, filter)
    }

    fn fallback(
        &self,
        entity: EntityType,
        filter: &Filter,
        remote_id: i64,
    ) -> Result<Option<LocalRecord>> {
        let Some(record) = self.lookup(entity, filter)? else {
            return Ok(None);
        };
        match record.external_id {
            Some(linked) if linked != remote_id => {
                tracing::debug!(
                    record_id = %record.id,
                    linked_remote_id = linked,
                    remote_id,
                    ?filter,
                    "Skipping fallback match already linked to another remote record"
                );
                Ok(None)
            }
            _ => Ok(Some(record)),
        }
    }
}

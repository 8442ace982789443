//! storesync-core - Core library for storesync
//!
//! This crate contains the remote store client, the reconciliation engine, and
//! the pull/push sync jobs that mirror a commerce platform's catalog
//! (products, customers, orders) into local storage.

pub mod audit;
pub mod config;
pub mod error;
pub mod job;
pub mod mapper;
pub mod models;
pub mod reconcile;
pub mod remote;
pub mod store;
mod util;

pub use config::{ConfigError, StoreConnection, SyncSettings, TlsPolicy};
pub use error::{Error, Result};
pub use models::{EntityType, JobOutcome, RecordId, Scope, SyncJobSpec, SyncResult};
pub use remote::{ClassifiedError, ErrorType, RemoteError, Severity};

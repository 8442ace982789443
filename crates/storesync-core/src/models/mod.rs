//! Data models for storesync

mod customer;
mod entity;
mod job;
mod order;
mod product;
mod record;

pub use customer::{Address, LocalCustomer, RemoteCustomer};
pub use entity::{EntityType, Scope};
pub use job::{
    JobOutcome, JobRequest, JobState, PushOperation, PushReceipt, StoreCredentials, SyncJobSpec,
    SyncResult,
};
pub use order::{LocalLineItem, LocalOrder, RemoteLineItem, RemoteOrder};
pub use product::{CategoryRef, LocalProduct, RemoteImage, RemoteProduct};
pub use record::{LocalRecord, RecordId, SyncStatus};

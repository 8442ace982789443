//! Field mapping between remote records and local entity data.
//!
//! Mappers are pure: no I/O, no validation beyond shape coercion.

mod customer;
mod order;
mod product;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::EntityType;
use crate::util::normalize_text_ref;

pub use customer::{CustomerMapper, CustomerPayload};
pub use order::{OrderLineItemPayload, OrderMapper, OrderPayload};
pub use product::{CategoryIdPayload, ProductImagePayload, ProductMapper, ProductPayload};

/// Per-entity transforms for both sync directions.
pub trait EntityMapper: Send + Sync + 'static {
    const ENTITY: EntityType;

    /// Shape returned by the remote list endpoint
    type Remote: DeserializeOwned + Send;
    /// Shape stored in `LocalRecord::data`
    type Local: Serialize + DeserializeOwned + Send;
    /// Body sent on create/update
    type Payload: Serialize + Send + Sync;

    fn remote_id(remote: &Self::Remote) -> i64;

    /// SKU, email, or order key of a remote record, when present.
    fn remote_natural_key(remote: &Self::Remote) -> Option<String>;

    fn local_natural_key(local: &Self::Local) -> Option<String>;

    fn to_local(remote: &Self::Remote) -> Self::Local;

    fn to_payload(local: &Self::Local) -> Self::Payload;
}

/// Trimmed natural key; blank values do not participate in matching.
pub(crate) fn natural_key(value: Option<&str>) -> Option<String> {
    normalize_text_ref(value)
}

fn or_default(value: Option<&str>, default: &str) -> String {
    normalize_text_ref(value).unwrap_or_else(|| default.to_string())
}

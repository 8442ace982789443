//! Order shapes on both sides of the sync

use serde::{Deserialize, Serialize};

use super::Address;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteLineItem {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub product_id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub total: Option<String>,
}

/// Order as returned by `GET /orders`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteOrder {
    pub id: i64,
    #[serde(default)]
    pub order_key: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub total: Option<String>,
    #[serde(default)]
    pub total_tax: Option<String>,
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default)]
    pub billing: Option<Address>,
    #[serde(default)]
    pub line_items: Vec<RemoteLineItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalLineItem {
    #[serde(default)]
    pub product_external_id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub total: Option<String>,
}

/// Order fields kept locally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalOrder {
    #[serde(default)]
    pub order_key: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub total: Option<String>,
    #[serde(default)]
    pub total_tax: Option<String>,
    /// Remote id of the ordering customer; 0 on the remote means guest checkout
    #[serde(default)]
    pub customer_external_id: Option<i64>,
    #[serde(default)]
    pub billing: Option<Address>,
    #[serde(default)]
    pub line_items: Vec<LocalLineItem>,
    #[serde(default)]
    pub placed_at: Option<String>,
}

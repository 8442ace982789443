use serde::Serialize;

use super::{natural_key, or_default, EntityMapper};
use crate::models::{Address, EntityType, LocalLineItem, LocalOrder, RemoteOrder};
use crate::util::normalize_text_ref;

const DEFAULT_STATUS: &str = "pending";
const DEFAULT_TOTAL: &str = "0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLineItemPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    pub name: String,
    pub quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<String>,
}

/// Body for `POST /orders` and `PUT /orders/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderPayload {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    pub total: String,
    pub total_tax: String,
    /// 0 places the order as a guest
    pub customer_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing: Option<Address>,
    pub line_items: Vec<OrderLineItemPayload>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OrderMapper;

impl EntityMapper for OrderMapper {
    const ENTITY: EntityType = EntityType::Order;

    type Remote = RemoteOrder;
    type Local = LocalOrder;
    type Payload = OrderPayload;

    fn remote_id(remote: &RemoteOrder) -> i64 {
        remote.id
    }

    fn remote_natural_key(remote: &RemoteOrder) -> Option<String> {
        natural_key(remote.order_key.as_deref())
    }

    fn local_natural_key(local: &LocalOrder) -> Option<String> {
        natural_key(local.order_key.as_deref())
    }

    fn to_local(remote: &RemoteOrder) -> LocalOrder {
        LocalOrder {
            order_key: normalize_text_ref(remote.order_key.as_deref()),
            number: normalize_text_ref(remote.number.as_deref()),
            status: normalize_text_ref(remote.status.as_deref()),
            currency: normalize_text_ref(remote.currency.as_deref()),
            total: normalize_text_ref(remote.total.as_deref()),
            total_tax: normalize_text_ref(remote.total_tax.as_deref()),
            customer_external_id: remote.customer_id.filter(|id| *id > 0),
            billing: remote
                .billing
                .as_ref()
                .filter(|billing| !billing.is_blank())
                .cloned(),
            line_items: remote
                .line_items
                .iter()
                .map(|item| LocalLineItem {
                    product_external_id: item.product_id.filter(|id| *id > 0),
                    name: item.name.trim().to_string(),
                    quantity: item.quantity,
                    sku: normalize_text_ref(item.sku.as_deref()),
                    total: normalize_text_ref(item.total.as_deref()),
                })
                .collect(),
            placed_at: normalize_text_ref(remote.date_created.as_deref()),
        }
    }

    fn to_payload(local: &LocalOrder) -> OrderPayload {
        OrderPayload {
            status: or_default(local.status.as_deref(), DEFAULT_STATUS),
            currency: normalize_text_ref(local.currency.as_deref()),
            total: or_default(local.total.as_deref(), DEFAULT_TOTAL),
            total_tax: or_default(local.total_tax.as_deref(), DEFAULT_TOTAL),
            customer_id: local.customer_external_id.unwrap_or(0),
            billing: local.billing.clone(),
            line_items: local
                .line_items
                .iter()
                .map(|item| OrderLineItemPayload {
                    product_id: item.product_external_id,
                    sku: item.sku.clone(),
                    name: item.name.clone(),
                    quantity: item.quantity,
                    total: item.total.clone(),
                })
                .collect(),
        }
    }
}

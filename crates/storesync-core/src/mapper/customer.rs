use serde::Serialize;

use super::{natural_key, EntityMapper};
use crate::models::{Address, EntityType, LocalCustomer, RemoteCustomer};
use crate::util::normalize_text_ref;

/// Body for `POST /customers` and `PUT /customers/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerPayload {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping: Option<Address>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CustomerMapper;

fn email_key(email: Option<&str>) -> Option<String> {
    natural_key(email).map(|email| email.to_lowercase())
}

fn non_blank(address: Option<&Address>) -> Option<Address> {
    address.filter(|address| !address.is_blank()).cloned()
}

impl EntityMapper for CustomerMapper {
    const ENTITY: EntityType = EntityType::Customer;

    type Remote = RemoteCustomer;
    type Local = LocalCustomer;
    type Payload = CustomerPayload;

    fn remote_id(remote: &RemoteCustomer) -> i64 {
        remote.id
    }

    fn remote_natural_key(remote: &RemoteCustomer) -> Option<String> {
        email_key(remote.email.as_deref())
    }

    fn local_natural_key(local: &LocalCustomer) -> Option<String> {
        email_key(local.email.as_deref())
    }

    fn to_local(remote: &RemoteCustomer) -> LocalCustomer {
        let billing = non_blank(remote.billing.as_ref());
        let phone = billing
            .as_ref()
            .and_then(|billing| normalize_text_ref(billing.phone.as_deref()));

        LocalCustomer {
            email: normalize_text_ref(remote.email.as_deref()),
            first_name: normalize_text_ref(remote.first_name.as_deref()),
            last_name: normalize_text_ref(remote.last_name.as_deref()),
            username: normalize_text_ref(remote.username.as_deref()),
            phone,
            billing,
            shipping: non_blank(remote.shipping.as_ref()),
            registered_at: normalize_text_ref(remote.date_created.as_deref()),
        }
    }

    fn to_payload(local: &LocalCustomer) -> CustomerPayload {
        let mut billing = local.billing.clone();
        if let (Some(billing), Some(phone)) = (billing.as_mut(), local.phone.as_ref()) {
            if billing.phone.is_none() {
                billing.phone = Some(phone.clone());
            }
        }

        CustomerPayload {
            email: local.email.clone().unwrap_or_default(),
            first_name: local.first_name.clone().unwrap_or_default(),
            last_name: local.last_name.clone().unwrap_or_default(),
            username: normalize_text_ref(local.username.as_deref()),
            billing,
            shipping: local.shipping.clone(),
        }
    }
}

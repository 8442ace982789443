//! Entity type and tenant scope

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Remote catalog entity kinds that can be synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Product,
    Customer,
    Order,
}

impl EntityType {
    pub const ALL: [Self; 3] = [Self::Product, Self::Customer, Self::Order];

    /// Stable lowercase name used in storage and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Customer => "customer",
            Self::Order => "order",
        }
    }

    /// Collection path segment on the remote API.
    pub const fn remote_path(self) -> &'static str {
        match self {
            Self::Product => "products",
            Self::Customer => "customers",
            Self::Order => "orders",
        }
    }

    /// Name of the natural key used as the last reconciliation fallback.
    pub const fn natural_key_name(self) -> &'static str {
        match self {
            Self::Product => "sku",
            Self::Customer => "email",
            Self::Order => "order_key",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "product" | "products" => Ok(Self::Product),
            "customer" | "customers" => Ok(Self::Customer),
            "order" | "orders" => Ok(Self::Order),
            other => Err(format!("unknown entity type: {other}")),
        }
    }
}

/// Tenant scope every local lookup and write is confined to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub organization_id: String,
    pub store_id: String,
}

impl Scope {
    pub fn new(organization_id: impl Into<String>, store_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            store_id: store_id.into(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.organization_id, self.store_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_type_parses_singular_and_plural() {
        assert_eq!("product".parse::<EntityType>(), Ok(EntityType::Product));
        assert_eq!(" Customers ".parse::<EntityType>(), Ok(EntityType::Customer));
        assert_eq!("orders".parse::<EntityType>(), Ok(EntityType::Order));
        assert!("coupon".parse::<EntityType>().is_err());
    }

    #[test]
    fn entity_type_paths_and_keys() {
        assert_eq!(EntityType::Product.remote_path(), "products");
        assert_eq!(EntityType::Customer.natural_key_name(), "email");
        assert_eq!(EntityType::Order.to_string(), "order");
    }

    #[test]
    fn entity_type_serializes_lowercase() {
        let json = serde_json::to_string(&EntityType::Customer).unwrap();
        assert_eq!(json, "\"customer\"");
    }
}

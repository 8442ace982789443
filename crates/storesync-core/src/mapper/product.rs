use serde::Serialize;

use super::{natural_key, or_default, EntityMapper};
use crate::models::{CategoryRef, EntityType, LocalProduct, RemoteProduct};
use crate::util::normalize_text_ref;

const DEFAULT_STOCK_STATUS: &str = "instock";
const DEFAULT_PRODUCT_TYPE: &str = "simple";
const DEFAULT_STATUS: &str = "publish";
const DEFAULT_REGULAR_PRICE: &str = "0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductImagePayload {
    pub src: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryIdPayload {
    pub id: i64,
}

/// Body for `POST /products` and `PUT /products/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductPayload {
    pub name: String,
    #[serde(rename = "type")]
    pub product_type: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    pub regular_price: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_price: Option<String>,
    pub manage_stock: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<i64>,
    pub stock_status: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<CategoryIdPayload>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ProductImagePayload>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProductMapper;

impl EntityMapper for ProductMapper {
    const ENTITY: EntityType = EntityType::Product;

    type Remote = RemoteProduct;
    type Local = LocalProduct;
    type Payload = ProductPayload;

    fn remote_id(remote: &RemoteProduct) -> i64 {
        remote.id
    }

    fn remote_natural_key(remote: &RemoteProduct) -> Option<String> {
        natural_key(remote.sku.as_deref())
    }

    fn local_natural_key(local: &LocalProduct) -> Option<String> {
        natural_key(local.sku.as_deref())
    }

    fn to_local(remote: &RemoteProduct) -> LocalProduct {
        LocalProduct {
            name: remote.name.trim().to_string(),
            sku: normalize_text_ref(remote.sku.as_deref()),
            slug: normalize_text_ref(remote.slug.as_deref()),
            product_type: normalize_text_ref(remote.product_type.as_deref()),
            status: normalize_text_ref(remote.status.as_deref()),
            description: normalize_text_ref(remote.description.as_deref()),
            short_description: normalize_text_ref(remote.short_description.as_deref()),
            price: normalize_text_ref(remote.price.as_deref()),
            regular_price: normalize_text_ref(remote.regular_price.as_deref()),
            sale_price: normalize_text_ref(remote.sale_price.as_deref()),
            stock_quantity: if remote.manage_stock {
                remote.stock_quantity
            } else {
                None
            },
            stock_status: normalize_text_ref(remote.stock_status.as_deref()),
            categories: remote
                .categories
                .iter()
                .map(|category| CategoryRef {
                    id: category.id,
                    name: category.name.clone(),
                })
                .collect(),
            images: remote
                .images
                .iter()
                .filter_map(|image| normalize_text_ref(Some(&image.src)))
                .collect(),
        }
    }

    fn to_payload(local: &LocalProduct) -> ProductPayload {
        ProductPayload {
            name: local.name.trim().to_string(),
            product_type: or_default(local.product_type.as_deref(), DEFAULT_PRODUCT_TYPE),
            status: or_default(local.status.as_deref(), DEFAULT_STATUS),
            sku: normalize_text_ref(local.sku.as_deref()),
            slug: normalize_text_ref(local.slug.as_deref()),
            description: local.description.clone(),
            short_description: local.short_description.clone(),
            regular_price: or_default(local.regular_price.as_deref(), DEFAULT_REGULAR_PRICE),
            sale_price: normalize_text_ref(local.sale_price.as_deref()),
            manage_stock: local.stock_quantity.is_some(),
            stock_quantity: local.stock_quantity,
            stock_status: or_default(local.stock_status.as_deref(), DEFAULT_STOCK_STATUS),
            categories: local
                .categories
                .iter()
                .map(|category| CategoryIdPayload { id: category.id })
                .collect(),
            images: local
                .images
                .iter()
                .map(|src| ProductImagePayload { src: src.clone() })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn remote() -> RemoteProduct {
        serde_json::from_value(json!({
            "id": 31,
            "name": " Enamel Mug ",
            "sku": " MUG-01 ",
            "type": "simple",
            "status": "publish",
            "price": "12.00",
            "regular_price": "12.00",
            "sale_price": "",
            "manage_stock": true,
            "stock_quantity": 4,
            "stock_status": "instock",
            "categories": [{"id": 9, "name": "Kitchen"}],
            "images": [{"id": 1, "src": "https://cdn.example.com/mug.jpg"}, {"src": " "}]
        }))
        .unwrap()
    }

    #[test]
    fn pull_mapping_normalizes_text_fields() {
        let local = ProductMapper::to_local(&remote());
        assert_eq!(local.name, "Enamel Mug");
        assert_eq!(local.sku.as_deref(), Some("MUG-01"));
        assert_eq!(local.sale_price, None);
        assert_eq!(local.stock_quantity, Some(4));
        assert_eq!(local.images, vec!["https://cdn.example.com/mug.jpg".to_string()]);
        assert_eq!(ProductMapper::remote_natural_key(&remote()).as_deref(), Some("MUG-01"));
    }

    #[test]
    fn unmanaged_stock_drops_quantity() {
        let mut product = remote();
        product.manage_stock = false;
        assert_eq!(ProductMapper::to_local(&product).stock_quantity, None);
    }

    #[test]
    fn push_mapping_fills_defaults() {
        let local = LocalProduct {
            name: "Plain Tee".to_string(),
            ..LocalProduct::default()
        };
        let payload = serde_json::to_value(ProductMapper::to_payload(&local)).unwrap();
        assert_eq!(
            payload,
            json!({
                "name": "Plain Tee",
                "type": "simple",
                "status": "publish",
                "regular_price": "0",
                "manage_stock": false,
                "stock_status": "instock"
            })
        );
    }

    #[test]
    fn blank_sku_is_not_a_natural_key() {
        let local = LocalProduct {
            sku: Some("   ".to_string()),
            ..LocalProduct::default()
        };
        assert_eq!(ProductMapper::local_natural_key(&local), None);
    }
}

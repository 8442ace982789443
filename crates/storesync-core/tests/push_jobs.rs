//! Push jobs against a mock remote store.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use storesync_core::audit::{AuditOperation, AuditStatus, SyncAuditLogger};
use storesync_core::job::{run_push, JobContext, PushRequest};
use storesync_core::models::{
    LocalCustomer, LocalProduct, LocalRecord, PushOperation, PushReceipt, SyncStatus,
};
use storesync_core::store::{DocumentStore, Filter, SqliteDocumentStore};
use storesync_core::{
    EntityType, ErrorType, JobOutcome, RecordId, Scope, StoreConnection, SyncJobSpec,
    SyncSettings,
};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    server: MockServer,
    store: Arc<SqliteDocumentStore>,
    context: JobContext,
}

impl Harness {
    async fn start() -> Self {
        let server = MockServer::start().await;
        let store = Arc::new(SqliteDocumentStore::open_in_memory().unwrap());
        let context = JobContext::new(
            store.clone(),
            SyncAuditLogger::new(store.clone()),
            SyncSettings::default(),
        );
        Self {
            server,
            store,
            context,
        }
    }

    fn seed(&self, record: &LocalRecord) {
        self.store
            .create(record.entity_type, &scope(), record)
            .unwrap();
    }

    fn load(&self, entity: EntityType, id: RecordId) -> LocalRecord {
        self.store
            .find_one(entity, &scope(), &Filter::Id(id))
            .unwrap()
            .unwrap()
    }

    async fn push(
        &self,
        entity: EntityType,
        operation: PushOperation,
        record_id: RecordId,
    ) -> JobOutcome<PushReceipt> {
        let connection =
            StoreConnection::new("store-1", &self.server.uri(), "ck_test", "cs_test").unwrap();
        let request = PushRequest {
            job: SyncJobSpec::new("store-1", entity, "org-1", "user-1"),
            operation,
            record_id,
        };
        run_push(&self.context, &connection, request, CancellationToken::new()).await
    }
}

fn scope() -> Scope {
    Scope::new("org-1", "store-1")
}

fn mug() -> LocalRecord {
    let product = LocalProduct {
        name: "Enamel Mug".to_string(),
        sku: Some("MUG-01".to_string()),
        ..LocalProduct::default()
    };
    LocalRecord::new(EntityType::Product, scope(), &product)
        .unwrap()
        .with_natural_key(product.sku.clone())
}

#[tokio::test]
async fn create_links_record_to_new_remote_id() {
    let harness = Harness::start().await;
    let record = mug();
    harness.seed(&record);

    Mock::given(method("POST"))
        .and(path("/wp-json/wc/v3/products"))
        .and(query_param("consumer_key", "ck_test"))
        .and(body_partial_json(json!({
            "name": "Enamel Mug",
            "sku": "MUG-01",
            "type": "simple",
            "status": "publish",
            "regular_price": "0",
            "stock_status": "instock"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 31, "name": "Enamel Mug"})))
        .expect(1)
        .mount(&harness.server)
        .await;

    let outcome = harness
        .push(EntityType::Product, PushOperation::Create, record.id)
        .await;

    assert_eq!(
        outcome.data(),
        Some(&PushReceipt {
            operation: PushOperation::Create,
            record_id: record.id,
            remote_id: Some(31),
        })
    );
    let stored = harness.load(EntityType::Product, record.id);
    assert_eq!(stored.external_id, Some(31));
    assert_eq!(stored.sync_status, SyncStatus::Synced);
    assert!(stored.last_synced_at.is_some());

    let events = harness.store.recent_audit_events(1).unwrap();
    assert_eq!(events[0].operation, AuditOperation::Create);
    assert_eq!(events[0].status, AuditStatus::Success);
    assert_eq!(events[0].remote_id, Some(31));
    assert_eq!(events[0].entity_id, Some(record.id.as_str()));
}

#[tokio::test]
async fn update_puts_to_linked_remote_id_and_refreshes_natural_key() {
    let harness = Harness::start().await;
    let customer = LocalCustomer {
        email: Some("ada@example.com".to_string()),
        first_name: Some("Ada".to_string()),
        ..LocalCustomer::default()
    };
    let record = LocalRecord::new(EntityType::Customer, scope(), &customer)
        .unwrap()
        .with_natural_key(Some("old@example.com".to_string()))
        .with_external_id(5);
    harness.seed(&record);

    Mock::given(method("PUT"))
        .and(path("/wp-json/wc/v3/customers/5"))
        .and(body_partial_json(json!({"email": "ada@example.com", "first_name": "Ada"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 5})))
        .expect(1)
        .mount(&harness.server)
        .await;

    let outcome = harness
        .push(EntityType::Customer, PushOperation::Update, record.id)
        .await;

    assert!(outcome.is_success());
    let stored = harness.load(EntityType::Customer, record.id);
    assert_eq!(stored.sync_status, SyncStatus::Synced);
    assert_eq!(stored.natural_key.as_deref(), Some("ada@example.com"));
}

#[tokio::test]
async fn update_without_remote_link_is_not_found() {
    let harness = Harness::start().await;
    let record = mug();
    harness.seed(&record);

    let outcome = harness
        .push(EntityType::Product, PushOperation::Update, record.id)
        .await;

    assert_eq!(outcome.error_type(), Some(ErrorType::NotFound));
    assert!(harness.server.received_requests().await.unwrap().is_empty());
    assert_eq!(
        harness.load(EntityType::Product, record.id).sync_status,
        SyncStatus::Failed
    );
}

#[tokio::test]
async fn delete_clears_the_remote_link() {
    let harness = Harness::start().await;
    let record = mug().with_external_id(31);
    harness.seed(&record);

    Mock::given(method("DELETE"))
        .and(path("/wp-json/wc/v3/products/31"))
        .and(query_param("force", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 31})))
        .expect(1)
        .mount(&harness.server)
        .await;

    let outcome = harness
        .push(EntityType::Product, PushOperation::Delete, record.id)
        .await;

    assert!(outcome.is_success());
    let stored = harness.load(EntityType::Product, record.id);
    assert_eq!(stored.external_id, None);
    assert_eq!(stored.sync_status, SyncStatus::Synced);

    let events = harness.store.recent_audit_events(1).unwrap();
    assert_eq!(events[0].operation, AuditOperation::Delete);
    assert_eq!(events[0].remote_id, Some(31));
}

#[tokio::test]
async fn remote_rejection_marks_record_failed() {
    let harness = Harness::start().await;
    let record = mug().with_external_id(31);
    harness.seed(&record);

    Mock::given(method("PUT"))
        .and(path("/wp-json/wc/v3/products/31"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "code": "woocommerce_rest_cannot_edit",
            "message": "Sorry, you are not allowed to edit this resource."
        })))
        .mount(&harness.server)
        .await;

    let outcome = harness
        .push(EntityType::Product, PushOperation::Update, record.id)
        .await;

    assert_eq!(outcome.error_type(), Some(ErrorType::PermissionError));
    let stored = harness.load(EntityType::Product, record.id);
    assert_eq!(stored.sync_status, SyncStatus::Failed);
    assert!(stored
        .sync_error
        .is_some_and(|error| error.contains("not allowed to edit")));

    let events = harness.store.recent_audit_events(1).unwrap();
    assert_eq!(events[0].status, AuditStatus::Failed);
}

#[tokio::test]
async fn missing_local_record_is_not_found() {
    let harness = Harness::start().await;

    let outcome = harness
        .push(EntityType::Order, PushOperation::Create, RecordId::new())
        .await;

    assert_eq!(outcome.error_type(), Some(ErrorType::NotFound));
}

//! Repository tests against an in-process stand-in for the Cosmos DB REST API
//!
//! `FakeCosmos` keeps documents keyed by `(partition key, id)` and answers
//! the document endpoints the way the service does: upsert/insert via POST,
//! 404 for missing documents, 409 for duplicate inserts, and paged query
//! results linked by `x-ms-continuation`.
//!
//! Addressing is header-only: the partition comes from the
//! `x-ms-documentdb-partitionkey` header and the body is never inspected for
//! a partition-key path, matching the container layout the repository
//! assumes.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use database::cosmos::{CosmosConfig, StatusCode};
use domain_products::*;
use serde_json::{json, Value};
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

// base64("test-master-key")
const TEST_KEY: &str = "dGVzdC1tYXN0ZXIta2V5";
const DOCS_PATH: &str = r"^/dbs/catalog/colls/products/docs";

#[derive(Clone)]
struct FakeCosmos {
    documents: Arc<Mutex<BTreeMap<(String, String), Value>>>,
    page_size: usize,
}

impl FakeCosmos {
    fn new(page_size: usize) -> Self {
        Self {
            documents: Arc::new(Mutex::new(BTreeMap::new())),
            page_size,
        }
    }

    fn header<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
        request.headers.get(name).and_then(|v| v.to_str().ok())
    }

    fn partition_key(request: &Request) -> Option<String> {
        let raw = Self::header(request, "x-ms-documentdb-partitionkey")?;
        let values: Vec<String> = serde_json::from_str(raw).ok()?;
        values.into_iter().next()
    }

    fn error(status: u16, code: &str) -> ResponseTemplate {
        ResponseTemplate::new(status).set_body_json(json!({ "code": code, "message": code }))
    }

    fn query(&self, request: &Request) -> ResponseTemplate {
        let documents = self.documents.lock().unwrap();
        let all: Vec<Value> = documents.values().cloned().collect();

        let offset: usize = Self::header(request, "x-ms-continuation")
            .and_then(|token| token.parse().ok())
            .unwrap_or(0);
        let end = (offset + self.page_size).min(all.len());
        let page = &all[offset.min(end)..end];

        let mut response = ResponseTemplate::new(200).set_body_json(json!({
            "_rid": "Zs8BAKSBjXg=",
            "Documents": page,
            "_count": page.len(),
        }));
        if end < all.len() {
            response = response.insert_header("x-ms-continuation", end.to_string().as_str());
        }
        response
    }

    fn write(&self, request: &Request, partition_key: String) -> ResponseTemplate {
        let mut document: Value = match serde_json::from_slice(&request.body) {
            Ok(value) => value,
            Err(_) => return Self::error(400, "BadRequest"),
        };
        let Some(id) = document.get("id").and_then(Value::as_str).map(str::to_string) else {
            return Self::error(400, "BadRequest");
        };

        let upsert = Self::header(request, "x-ms-documentdb-is-upsert") == Some("True");
        let key = (partition_key, id);
        let mut documents = self.documents.lock().unwrap();

        if !upsert && documents.contains_key(&key) {
            return Self::error(409, "Conflict");
        }

        let status = if documents.contains_key(&key) { 200 } else { 201 };
        document["_rid"] = json!("Zs8BAKSBjXgBAAAAAAAAAA==");
        document["_ts"] = json!(1_700_000_000);
        documents.insert(key, document.clone());
        ResponseTemplate::new(status).set_body_json(document)
    }
}

impl Respond for FakeCosmos {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let segments: Vec<&str> = request.url.path().trim_start_matches('/').split('/').collect();
        let verb = request.method.to_string();

        match (verb.as_str(), segments.as_slice()) {
            ("POST", [_, _, _, _, "docs"]) => {
                if Self::header(request, "x-ms-documentdb-isquery") == Some("True") {
                    return self.query(request);
                }
                match Self::partition_key(request) {
                    Some(pk) => self.write(request, pk),
                    None => Self::error(400, "BadRequest"),
                }
            }
            ("GET", [_, _, _, _, "docs", id]) => {
                let Some(pk) = Self::partition_key(request) else {
                    return Self::error(400, "BadRequest");
                };
                let documents = self.documents.lock().unwrap();
                match documents.get(&(pk, id.to_string())) {
                    Some(document) => ResponseTemplate::new(200).set_body_json(document),
                    None => Self::error(404, "NotFound"),
                }
            }
            ("DELETE", [_, _, _, _, "docs", id]) => {
                let Some(pk) = Self::partition_key(request) else {
                    return Self::error(400, "BadRequest");
                };
                let mut documents = self.documents.lock().unwrap();
                match documents.remove(&(pk, id.to_string())) {
                    Some(_) => ResponseTemplate::new(204),
                    None => Self::error(404, "NotFound"),
                }
            }
            _ => Self::error(405, "MethodNotAllowed"),
        }
    }
}

async fn fake_store(page_size: usize) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(path_regex(DOCS_PATH))
        .respond_with(FakeCosmos::new(page_size))
        .mount(&server)
        .await;
    server
}

fn repository(server: &MockServer, partition_key: &str) -> CosmosProductRepository {
    let config = CosmosConfig::new(server.uri(), "catalog", "products", partition_key)
        .with_key(TEST_KEY);
    CosmosProductRepository::new(&config).unwrap()
}

// ============================================================================
// Round trips
// ============================================================================

#[tokio::test]
async fn test_save_then_get_returns_equal_product() {
    let server = fake_store(10).await;
    let repo = repository(&server, "tenant-a");
    let product = Product::new("p1", "Widget", "A widget");

    repo.save(&product).await.unwrap();

    assert_eq!(repo.get_by_id("p1").await.unwrap(), Some(product.clone()));
    assert_eq!(repo.get("p1").await.unwrap(), Some(product));
}

#[tokio::test]
async fn test_save_overwrites_existing_product() {
    let server = fake_store(10).await;
    let repo = repository(&server, "tenant-a");

    repo.save(&Product::new("p1", "Widget", "A widget")).await.unwrap();
    let replacement = Product::new("p1", "Widget v2", "A better widget");
    repo.save(&replacement).await.unwrap();

    assert_eq!(repo.get_by_id("p1").await.unwrap(), Some(replacement));
    assert_eq!(repo.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_get_unknown_id_is_none() {
    let server = fake_store(10).await;
    let repo = repository(&server, "tenant-a");

    assert_eq!(repo.get_by_id("never-saved").await.unwrap(), None);
    assert_eq!(repo.get("never-saved").await.unwrap(), None);
}

#[tokio::test]
async fn test_delete_unknown_id_succeeds() {
    let server = fake_store(10).await;
    let repo = repository(&server, "tenant-a");

    repo.delete("never-saved").await.unwrap();
}

#[tokio::test]
async fn test_delete_removes_product() {
    let server = fake_store(10).await;
    let repo = repository(&server, "tenant-a");

    repo.save(&Product::new("p1", "Widget", "A widget")).await.unwrap();
    repo.delete("p1").await.unwrap();

    assert_eq!(repo.get_by_id("p1").await.unwrap(), None);
    // A second delete of the same id is still fine
    repo.delete("p1").await.unwrap();
}

#[tokio::test]
async fn test_widget_lifecycle() {
    let server = fake_store(10).await;
    let repo = repository(&server, "tenant-a");
    let widget = Product::new("p1", "Widget", "A widget");

    repo.save(&widget).await.unwrap();
    assert_eq!(repo.get_by_id("p1").await.unwrap(), Some(widget));

    repo.delete("p1").await.unwrap();
    assert_eq!(repo.get_by_id("p1").await.unwrap(), None);
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_list_returns_every_saved_product_across_pages() {
    // Page size 2 forces the adapter to follow continuation tokens
    let server = fake_store(2).await;
    let repo = repository(&server, "tenant-a");

    let saved: Vec<Product> = (1..=5)
        .map(|i| Product::new(format!("p{i}"), format!("Product {i}"), format!("Item number {i}")))
        .collect();
    for product in &saved {
        repo.save(product).await.unwrap();
    }

    let listed = repo.list().await.unwrap();

    assert_eq!(listed.len(), saved.len());
    let listed_ids: HashSet<String> = listed.iter().map(|p| p.id.clone()).collect();
    let saved_ids: HashSet<String> = saved.iter().map(|p| p.id.clone()).collect();
    assert_eq!(listed_ids, saved_ids);
    for product in &saved {
        assert!(listed.contains(product));
    }
}

#[tokio::test]
async fn test_list_empty_collection() {
    let server = fake_store(10).await;
    let repo = repository(&server, "tenant-a");

    assert!(repo.list().await.unwrap().is_empty());
}

// ============================================================================
// Addressing and construction
// ============================================================================

#[tokio::test]
async fn test_documents_are_addressed_by_configured_partition_key() {
    let server = fake_store(10).await;
    let tenant_a = repository(&server, "tenant-a");
    let tenant_b = repository(&server, "tenant-b");

    tenant_a.save(&Product::new("p1", "Widget", "A widget")).await.unwrap();

    assert!(tenant_a.get_by_id("p1").await.unwrap().is_some());
    assert_eq!(tenant_b.get_by_id("p1").await.unwrap(), None);
}

#[tokio::test]
async fn test_construction_performs_no_requests() {
    let server = fake_store(10).await;
    let _repo = repository(&server, "tenant-a");

    let received = server.received_requests().await.unwrap();
    assert!(received.is_empty());
}

#[tokio::test]
async fn test_each_operation_is_one_request() {
    let server = fake_store(10).await;
    let repo = repository(&server, "tenant-a");

    repo.save(&Product::new("p1", "Widget", "A widget")).await.unwrap();
    repo.get_by_id("p1").await.unwrap();
    repo.delete("p1").await.unwrap();
    repo.list().await.unwrap();

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 4);
}

#[tokio::test]
async fn test_whitespace_id_is_sent_to_the_store() {
    let server = fake_store(10).await;
    let repo = repository(&server, "tenant-a");

    assert_eq!(repo.get_by_id(" ").await.unwrap(), None);
    repo.delete(" ").await.unwrap();

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 2);
}

// ============================================================================
// Create (insert-only)
// ============================================================================

#[tokio::test]
async fn test_create_inserts_new_product() {
    let server = fake_store(10).await;
    let repo = repository(&server, "tenant-a");
    let product = Product::new("p1", "Widget", "A widget");

    repo.create(&product).await.unwrap();

    assert_eq!(repo.get("p1").await.unwrap(), Some(product));
}

#[tokio::test]
async fn test_create_existing_product_is_rejected() {
    let server = fake_store(10).await;
    let repo = repository(&server, "tenant-a");

    repo.create(&Product::new("p1", "Widget", "A widget")).await.unwrap();
    let err = repo
        .create(&Product::new("p1", "Other", "Different"))
        .await
        .unwrap_err();

    assert_eq!(err.store_status(), Some(StatusCode::CONFLICT));
    // The stored document is untouched
    assert_eq!(repo.get("p1").await.unwrap().unwrap().name, "Widget");
}

// ============================================================================
// Failures other than "not found"
// ============================================================================

async fn failing_store(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(DOCS_PATH))
        .respond_with(
            ResponseTemplate::new(status)
                .set_body_json(json!({ "code": "ServiceUnavailable", "message": "try later" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(DOCS_PATH))
        .respond_with(
            ResponseTemplate::new(status)
                .set_body_json(json!({ "code": "ServiceUnavailable", "message": "try later" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path_regex(DOCS_PATH))
        .respond_with(
            ResponseTemplate::new(status)
                .set_body_json(json!({ "code": "ServiceUnavailable", "message": "try later" })),
        )
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_store_failures_propagate_from_every_operation() {
    let server = failing_store(503).await;
    let repo = repository(&server, "tenant-a");
    let product = Product::new("p1", "Widget", "A widget");

    let errors = vec![
        repo.save(&product).await.unwrap_err(),
        repo.create(&product).await.unwrap_err(),
        repo.get_by_id("p1").await.unwrap_err(),
        repo.get("p1").await.unwrap_err(),
        repo.delete("p1").await.unwrap_err(),
        repo.list().await.unwrap_err(),
    ];

    for err in errors {
        assert!(matches!(err, ProductError::Store(_)));
        assert_eq!(err.store_status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    }
}

#[tokio::test]
async fn test_failures_are_not_retried() {
    let server = failing_store(500).await;
    let repo = repository(&server, "tenant-a");

    let _ = repo.get_by_id("p1").await;

    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unauthorized_read_is_an_error_not_absence() {
    let server = failing_store(401).await;
    let repo = repository(&server, "tenant-a");

    let err = repo.get_by_id("p1").await.unwrap_err();
    assert_eq!(err.store_status(), Some(StatusCode::UNAUTHORIZED));
}

#[tokio::test]
async fn test_unreachable_store_is_an_error() {
    // Nothing listens on port 1
    let config = CosmosConfig::new("http://127.0.0.1:1", "catalog", "products", "tenant-a")
        .with_key(TEST_KEY);
    let repo = CosmosProductRepository::new(&config).unwrap();

    let err = repo.get_by_id("p1").await.unwrap_err();
    assert!(matches!(err, ProductError::Store(_)));
    assert_eq!(err.store_status(), None);
}

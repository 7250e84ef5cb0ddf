use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::CosmosConfig;
use super::auth::{Credential, ResourceType};
use super::error::{CosmosError, CosmosResult};

/// REST API version sent with every request
pub const API_VERSION: &str = "2018-12-31";

const HEADER_DATE: &str = "x-ms-date";
const HEADER_VERSION: &str = "x-ms-version";
const HEADER_PARTITION_KEY: &str = "x-ms-documentdb-partitionkey";
const HEADER_IS_UPSERT: &str = "x-ms-documentdb-is-upsert";
const HEADER_IS_QUERY: &str = "x-ms-documentdb-isquery";
const HEADER_CROSS_PARTITION: &str = "x-ms-documentdb-query-enablecrosspartition";
const HEADER_CONTINUATION: &str = "x-ms-continuation";
const QUERY_CONTENT_TYPE: &str = "application/query+json";

/// Partition key value a document is stored under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionKey(String);

impl PartitionKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn value(&self) -> &str {
        &self.0
    }

    /// Header form: a single-element JSON array
    pub fn header_value(&self) -> String {
        serde_json::json!([self.0]).to_string()
    }
}

impl From<&str> for PartitionKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PartitionKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Handle to a Cosmos DB account
///
/// Cheap to clone; clones share one HTTP connection pool and credential.
/// Creating a client performs no network I/O.
#[derive(Debug, Clone)]
pub struct CosmosClient {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    http: reqwest::Client,
    endpoint: String,
    credential: Credential,
}

struct CosmosRequest<'a> {
    method: Method,
    resource_type: ResourceType,
    /// Unencoded link covered by the signature
    resource_link: &'a str,
    /// Percent-encoded URL path
    path: &'a str,
    headers: Vec<(&'static str, String)>,
    body: Option<(&'static str, Vec<u8>)>,
}

impl CosmosClient {
    /// Create a client for `endpoint` with the default request timeout
    pub fn new(endpoint: &str, credential: Credential) -> CosmosResult<Self> {
        Self::with_timeout(endpoint, credential, Duration::from_secs(30))
    }

    pub fn with_timeout(
        endpoint: &str,
        credential: Credential,
        timeout: Duration,
    ) -> CosmosResult<Self> {
        let parsed = Url::parse(endpoint).map_err(|e| CosmosError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            details: e.to_string(),
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CosmosError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                details: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                endpoint: endpoint.trim_end_matches('/').to_string(),
                credential,
            }),
        })
    }

    /// Create a client from a [`CosmosConfig`]
    ///
    /// # Example
    /// ```ignore
    /// use database::cosmos::{CosmosClient, CosmosConfig};
    ///
    /// let config = CosmosConfig::new(endpoint, "catalog", "products", "products").with_key(key);
    /// let container = CosmosClient::from_config(&config)?
    ///     .database(config.database())
    ///     .container(config.container());
    /// ```
    pub fn from_config(config: &CosmosConfig) -> CosmosResult<Self> {
        Self::with_timeout(
            &config.endpoint,
            config.credential()?,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    pub fn database(&self, id: impl Into<String>) -> DatabaseClient {
        DatabaseClient {
            client: self.clone(),
            id: id.into(),
        }
    }

    async fn send(&self, request: CosmosRequest<'_>) -> CosmosResult<reqwest::Response> {
        let date = rfc1123_now();
        let authorization = self
            .inner
            .credential
            .authorization(
                &request.method,
                request.resource_type,
                request.resource_link,
                &date,
            )
            .await?;

        let url = format!("{}/{}", self.inner.endpoint, request.path);
        debug!(method = %request.method, %url, "Sending Cosmos DB request");

        let mut builder = self
            .inner
            .http
            .request(request.method, url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .header(HEADER_DATE, date)
            .header(HEADER_VERSION, API_VERSION);

        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }

        if let Some((content_type, body)) = request.body {
            builder = builder.header(CONTENT_TYPE, content_type).body(body);
        }

        let response = builder.send().await?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(CosmosError::from_response(response).await)
        }
    }
}

/// Minimal database resource properties
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseProperties {
    pub id: String,
    #[serde(rename = "_rid", default)]
    pub rid: Option<String>,
}

/// Handle to one database within an account
#[derive(Debug, Clone)]
pub struct DatabaseClient {
    client: CosmosClient,
    id: String,
}

impl DatabaseClient {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn container(&self, id: impl Into<String>) -> ContainerClient {
        ContainerClient {
            client: self.client.clone(),
            database: self.id.clone(),
            id: id.into(),
        }
    }

    /// Read the database resource (one round trip)
    #[instrument(skip(self), fields(database = %self.id), err(level = "debug"))]
    pub async fn read(&self) -> CosmosResult<DatabaseProperties> {
        let link = format!("dbs/{}", self.id);
        let path = format!("dbs/{}", urlencoding::encode(&self.id));

        let response = self
            .client
            .send(CosmosRequest {
                method: Method::GET,
                resource_type: ResourceType::Databases,
                resource_link: &link,
                path: &path,
                headers: Vec::new(),
                body: None,
            })
            .await?;

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[derive(Debug, Deserialize)]
struct QueryPage<T> {
    #[serde(rename = "Documents")]
    documents: Vec<T>,
}

#[derive(Debug, Serialize)]
struct QueryBody<'a> {
    query: &'a str,
    parameters: &'a [serde_json::Value],
}

/// Handle to one container; all document operations go through here
#[derive(Debug, Clone)]
pub struct ContainerClient {
    client: CosmosClient,
    database: String,
    id: String,
}

impl ContainerClient {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn database_id(&self) -> &str {
        &self.database
    }

    fn collection_link(&self) -> String {
        format!("dbs/{}/colls/{}", self.database, self.id)
    }

    fn documents_path(&self) -> String {
        format!(
            "dbs/{}/colls/{}/docs",
            urlencoding::encode(&self.database),
            urlencoding::encode(&self.id)
        )
    }

    fn document_link(&self, document_id: &str) -> String {
        format!("{}/docs/{}", self.collection_link(), document_id)
    }

    fn document_path(&self, document_id: &str) -> String {
        format!("{}/{}", self.documents_path(), urlencoding::encode(document_id))
    }

    /// Insert a document; fails with 409 if its id already exists
    #[instrument(skip(self, document), fields(container = %self.id), err(level = "debug"))]
    pub async fn create_document<T>(
        &self,
        partition_key: &PartitionKey,
        document: &T,
    ) -> CosmosResult<()>
    where
        T: Serialize + ?Sized,
    {
        self.write_document(partition_key, document, false).await
    }

    /// Insert or fully replace a document keyed by its id
    #[instrument(skip(self, document), fields(container = %self.id), err(level = "debug"))]
    pub async fn upsert_document<T>(
        &self,
        partition_key: &PartitionKey,
        document: &T,
    ) -> CosmosResult<()>
    where
        T: Serialize + ?Sized,
    {
        self.write_document(partition_key, document, true).await
    }

    async fn write_document<T>(
        &self,
        partition_key: &PartitionKey,
        document: &T,
        upsert: bool,
    ) -> CosmosResult<()>
    where
        T: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(document)?;
        let link = self.collection_link();
        let path = self.documents_path();

        let mut headers = vec![(HEADER_PARTITION_KEY, partition_key.header_value())];
        if upsert {
            headers.push((HEADER_IS_UPSERT, "True".to_string()));
        }

        self.client
            .send(CosmosRequest {
                method: Method::POST,
                resource_type: ResourceType::Documents,
                resource_link: &link,
                path: &path,
                headers,
                body: Some(("application/json", body)),
            })
            .await?;

        Ok(())
    }

    /// Read one document; a missing document is a 404 [`CosmosError::Service`]
    #[instrument(skip(self), fields(container = %self.id), err(level = "debug"))]
    pub async fn read_document<T>(
        &self,
        document_id: &str,
        partition_key: &PartitionKey,
    ) -> CosmosResult<T>
    where
        T: DeserializeOwned,
    {
        let link = self.document_link(document_id);
        let path = self.document_path(document_id);

        let response = self
            .client
            .send(CosmosRequest {
                method: Method::GET,
                resource_type: ResourceType::Documents,
                resource_link: &link,
                path: &path,
                headers: vec![(HEADER_PARTITION_KEY, partition_key.header_value())],
                body: None,
            })
            .await?;

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Delete one document; a missing document is a 404 [`CosmosError::Service`]
    #[instrument(skip(self), fields(container = %self.id), err(level = "debug"))]
    pub async fn delete_document(
        &self,
        document_id: &str,
        partition_key: &PartitionKey,
    ) -> CosmosResult<()> {
        let link = self.document_link(document_id);
        let path = self.document_path(document_id);

        self.client
            .send(CosmosRequest {
                method: Method::DELETE,
                resource_type: ResourceType::Documents,
                resource_link: &link,
                path: &path,
                headers: vec![(HEADER_PARTITION_KEY, partition_key.header_value())],
                body: None,
            })
            .await?;

        Ok(())
    }

    /// Run a SQL query across all partitions and collect every page
    #[instrument(skip(self), fields(container = %self.id), err(level = "debug"))]
    pub async fn query_documents<T>(&self, query: &str) -> CosmosResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let link = self.collection_link();
        let path = self.documents_path();
        let body = serde_json::to_vec(&QueryBody {
            query,
            parameters: &[],
        })?;

        let mut documents = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut headers = vec![
                (HEADER_IS_QUERY, "True".to_string()),
                (HEADER_CROSS_PARTITION, "True".to_string()),
            ];
            if let Some(token) = continuation.take() {
                headers.push((HEADER_CONTINUATION, token));
            }

            let response = self
                .client
                .send(CosmosRequest {
                    method: Method::POST,
                    resource_type: ResourceType::Documents,
                    resource_link: &link,
                    path: &path,
                    headers,
                    body: Some((QUERY_CONTENT_TYPE, body.clone())),
                })
                .await?;

            continuation = response
                .headers()
                .get(HEADER_CONTINUATION)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string);

            let bytes = response.bytes().await?;
            let page: QueryPage<T> = serde_json::from_slice(&bytes)?;
            documents.extend(page.documents);

            if continuation.is_none() {
                break;
            }
            debug!(fetched = documents.len(), "Following query continuation");
        }

        Ok(documents)
    }
}

/// Current time in the RFC 1123 form the service expects in `x-ms-date`
fn rfc1123_now() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

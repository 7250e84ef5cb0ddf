use std::env;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tokio::sync::Mutex;
use tracing::debug;

use super::error::{CosmosError, CosmosResult};

/// Instance metadata endpoint serving managed-identity tokens
pub const IMDS_TOKEN_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

/// AAD resource (audience) for Cosmos DB data-plane tokens
pub const COSMOS_AAD_RESOURCE: &str = "https://cosmos.azure.com";

const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";

const IDENTITY_ENDPOINT_VAR: &str = "IDENTITY_ENDPOINT";
const IDENTITY_HEADER_VAR: &str = "IDENTITY_HEADER";
const FEDERATED_TOKEN_FILE_VAR: &str = "AZURE_FEDERATED_TOKEN_FILE";
const TENANT_ID_VAR: &str = "AZURE_TENANT_ID";
const CLIENT_ID_VAR: &str = "AZURE_CLIENT_ID";
const AUTHORITY_HOST_VAR: &str = "AZURE_AUTHORITY_HOST";
const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
const JWT_BEARER_ASSERTION: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Tokens are refreshed this many seconds before they expire
const TOKEN_REFRESH_SKEW_SECS: i64 = 300;

/// Resource kinds that appear in the signed payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResourceType {
    Databases,
    Documents,
}

impl ResourceType {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Databases => "dbs",
            ResourceType::Documents => "docs",
        }
    }
}

/// How requests to the account are authorized
///
/// With an account key every request is signed locally. Without one, an AAD
/// token is obtained from the host's managed identity.
#[derive(Clone)]
pub enum Credential {
    MasterKey(MasterKey),
    ManagedIdentity(Arc<ManagedIdentityCredential>),
}

impl Credential {
    /// Build a key credential from the base64 account key
    pub fn master_key(key: &str) -> CosmosResult<Self> {
        MasterKey::from_base64(key).map(Credential::MasterKey)
    }

    /// Use the managed identity of the host
    ///
    /// App Service / Functions and workload-identity environments are
    /// recognised from their environment variables; anything else falls back
    /// to the VM metadata service.
    pub fn managed_identity() -> CosmosResult<Self> {
        Ok(Credential::ManagedIdentity(Arc::new(
            ManagedIdentityCredential::new()?,
        )))
    }

    /// Produce the `authorization` header value for one request
    pub(crate) async fn authorization(
        &self,
        verb: &Method,
        resource_type: ResourceType,
        resource_link: &str,
        date: &str,
    ) -> CosmosResult<String> {
        let token = match self {
            Credential::MasterKey(key) => {
                let signature = key.sign(verb.as_str(), resource_type.as_str(), resource_link, date)?;
                format!("type=master&ver=1.0&sig={signature}")
            }
            Credential::ManagedIdentity(identity) => {
                let token = identity.token().await?;
                format!("type=aad&ver=1.0&sig={token}")
            }
        };

        Ok(urlencoding::encode(&token).into_owned())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::MasterKey(_) => f.write_str("Credential::MasterKey(<redacted>)"),
            Credential::ManagedIdentity(identity) => f
                .debug_struct("Credential::ManagedIdentity")
                .field("source", &identity.source.name())
                .field("endpoint", &identity.endpoint)
                .finish(),
        }
    }
}

/// Decoded account key
#[derive(Clone)]
pub struct MasterKey {
    bytes: Vec<u8>,
}

impl MasterKey {
    pub fn from_base64(key: &str) -> CosmosResult<Self> {
        let bytes = STANDARD
            .decode(key.trim())
            .map_err(|e| CosmosError::InvalidKey(e.to_string()))?;

        if bytes.is_empty() {
            return Err(CosmosError::InvalidKey("key is empty".to_string()));
        }

        Ok(Self { bytes })
    }

    /// Base64 HMAC-SHA256 over `verb\nresourceType\nresourceLink\ndate\n\n`
    ///
    /// Verb, resource type and date are lowercased; the resource link is
    /// signed exactly as given (ids are case-sensitive).
    pub(crate) fn sign(
        &self,
        verb: &str,
        resource_type: &str,
        resource_link: &str,
        date: &str,
    ) -> CosmosResult<String> {
        let payload = format!(
            "{}\n{}\n{}\n{}\n\n",
            verb.to_lowercase(),
            resource_type.to_lowercase(),
            resource_link,
            date.to_lowercase()
        );

        let mut mac = Hmac::<Sha256>::new_from_slice(&self.bytes)
            .map_err(|e| CosmosError::InvalidKey(e.to_string()))?;
        mac.update(payload.as_bytes());

        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

#[derive(Debug, Clone)]
struct AccessToken {
    token: String,
    expires_on: i64,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        self.expires_on - TOKEN_REFRESH_SKEW_SECS > Utc::now().timestamp()
    }
}

/// Token payload shared by the identity endpoints
///
/// IMDS and App Service report `expires_on` as epoch seconds (string or
/// number); Entra ID reports a relative `expires_in`.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_on: Option<Value>,
    expires_in: Option<Value>,
}

impl TokenResponse {
    fn into_access_token(self) -> CosmosResult<AccessToken> {
        let expires_on = match (&self.expires_on, &self.expires_in) {
            (Some(on), _) => seconds(on).ok_or_else(|| {
                CosmosError::Credential(format!("unrecognised token expiry '{on}'"))
            })?,
            (None, Some(within)) => {
                Utc::now().timestamp()
                    + seconds(within).ok_or_else(|| {
                        CosmosError::Credential(format!("unrecognised token lifetime '{within}'"))
                    })?
            }
            (None, None) => {
                return Err(CosmosError::Credential(
                    "token response carries no expiry".to_string(),
                ));
            }
        };

        Ok(AccessToken {
            token: self.access_token,
            expires_on,
        })
    }
}

fn seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Where the host's managed identity hands out tokens
#[derive(Clone, PartialEq, Eq)]
enum TokenSource {
    /// Azure VM / VMSS instance metadata service
    Imds,
    /// App Service and Azure Functions (`IDENTITY_ENDPOINT` + `IDENTITY_HEADER`)
    AppService { secret: String },
    /// Federated token exchange on Kubernetes (`AZURE_FEDERATED_TOKEN_FILE`)
    WorkloadIdentity {
        tenant_id: String,
        client_id: String,
        token_file: PathBuf,
    },
}

impl TokenSource {
    fn name(&self) -> &'static str {
        match self {
            TokenSource::Imds => "imds",
            TokenSource::AppService { .. } => "app_service",
            TokenSource::WorkloadIdentity { .. } => "workload_identity",
        }
    }

    /// Detect the hosting environment, returning the source and its endpoint
    fn detect() -> (Self, String) {
        if let (Some(endpoint), Some(secret)) = (var(IDENTITY_ENDPOINT_VAR), var(IDENTITY_HEADER_VAR)) {
            return (TokenSource::AppService { secret }, endpoint);
        }

        if let (Some(token_file), Some(tenant_id), Some(client_id)) = (
            var(FEDERATED_TOKEN_FILE_VAR),
            var(TENANT_ID_VAR),
            var(CLIENT_ID_VAR),
        ) {
            let authority = var(AUTHORITY_HOST_VAR).unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string());
            return (
                TokenSource::WorkloadIdentity {
                    tenant_id,
                    client_id,
                    token_file: PathBuf::from(token_file),
                },
                authority,
            );
        }

        (TokenSource::Imds, IMDS_TOKEN_ENDPOINT.to_string())
    }
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Managed-identity token source
///
/// The protocol follows the hosting environment detected at construction:
/// App Service / Functions, workload identity, or the VM metadata service.
pub struct ManagedIdentityCredential {
    http: reqwest::Client,
    source: TokenSource,
    endpoint: String,
    resource: String,
    client_id: Option<String>,
    cached: Mutex<Option<AccessToken>>,
}

impl ManagedIdentityCredential {
    pub fn new() -> CosmosResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        let (source, endpoint) = TokenSource::detect();

        Ok(Self {
            http,
            source,
            endpoint,
            resource: COSMOS_AAD_RESOURCE.to_string(),
            client_id: None,
            cached: Mutex::new(None),
        })
    }

    /// Select a user-assigned identity
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Point at a different token endpoint (local tooling, tests)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Return a cached token, fetching a new one when close to expiry
    pub async fn token(&self) -> CosmosResult<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.token.clone());
        }

        let token = self.fetch().await?;
        let value = token.token.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn fetch(&self) -> CosmosResult<AccessToken> {
        debug!(
            endpoint = %self.endpoint,
            source = self.source.name(),
            "Requesting managed identity token"
        );

        let request = match &self.source {
            TokenSource::Imds => self
                .http
                .get(&self.endpoint)
                .query(&self.identity_query(IMDS_API_VERSION))
                .header("Metadata", "true"),
            TokenSource::AppService { secret } => self
                .http
                .get(&self.endpoint)
                .query(&self.identity_query(APP_SERVICE_API_VERSION))
                .header("X-IDENTITY-HEADER", secret.as_str()),
            TokenSource::WorkloadIdentity {
                tenant_id,
                client_id,
                token_file,
            } => {
                let assertion = tokio::fs::read_to_string(token_file).await.map_err(|e| {
                    CosmosError::Credential(format!(
                        "failed to read federated token {}: {e}",
                        token_file.display()
                    ))
                })?;
                let url = format!(
                    "{}/{}/oauth2/v2.0/token",
                    self.endpoint.trim_end_matches('/'),
                    tenant_id
                );
                let scope = format!("{}/.default", self.resource);
                let client_id = self.client_id.as_deref().unwrap_or(client_id.as_str());

                self.http.post(url).form(&[
                    ("client_assertion", assertion.trim()),
                    ("client_assertion_type", JWT_BEARER_ASSERTION),
                    ("client_id", client_id),
                    ("grant_type", "client_credentials"),
                    ("scope", scope.as_str()),
                ])
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| CosmosError::Credential(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CosmosError::Credential(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| CosmosError::Credential(e.to_string()))?
            .into_access_token()
    }

    fn identity_query<'a>(&'a self, api_version: &'a str) -> Vec<(&'a str, &'a str)> {
        let mut query = vec![("api-version", api_version), ("resource", self.resource.as_str())];
        if let Some(ref client_id) = self.client_id {
            query.push(("client_id", client_id.as_str()));
        }
        query
    }
}

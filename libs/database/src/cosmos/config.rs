use std::fmt;

#[cfg(feature = "config")]
use core_config::{ConfigError, FromEnv, env_optional, env_parse_or_default, env_required};

use super::auth::Credential;
use super::error::CosmosResult;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Cosmos DB container configuration
///
/// Identifies one container and the partition key value every document is
/// addressed under. When `key` is absent, requests are authorized with the
/// host's managed identity instead.
///
/// # Example
///
/// ```ignore
/// use database::cosmos::CosmosConfig;
///
/// let config = CosmosConfig::new(
///     "https://my-account.documents.azure.com:443/",
///     "catalog",
///     "products",
///     "products",
/// )
/// .with_key(std::env::var("COSMOS_KEY")?);
///
/// // From environment variables (requires `config` feature)
/// let config = CosmosConfig::from_env()?;
/// ```
#[derive(Clone)]
pub struct CosmosConfig {
    /// Account endpoint, e.g. `https://<account>.documents.azure.com:443/`
    pub endpoint: String,

    /// Database id
    pub database: String,

    /// Container id
    pub container: String,

    /// Partition key value used to address every document
    pub partition_key: String,

    /// Base64 account key; `None` selects managed identity
    pub key: Option<String>,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl CosmosConfig {
    pub fn new(
        endpoint: impl Into<String>,
        database: impl Into<String>,
        container: impl Into<String>,
        partition_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            database: database.into(),
            container: container.into(),
            partition_key: partition_key.into(),
            key: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }

    /// Authorize with an account key
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    /// Build the credential this configuration selects
    pub fn credential(&self) -> CosmosResult<Credential> {
        match self.key {
            Some(ref key) => Credential::master_key(key),
            None => Credential::managed_identity(),
        }
    }
}

impl fmt::Debug for CosmosConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CosmosConfig")
            .field("endpoint", &self.endpoint)
            .field("database", &self.database)
            .field("container", &self.container)
            .field("partition_key", &self.partition_key)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Load CosmosConfig from environment variables
///
/// Environment variables:
/// - `COSMOS_ENDPOINT` (required) - account endpoint URL
/// - `COSMOS_DATABASE` (required) - database id
/// - `COSMOS_CONTAINER` (required) - container id
/// - `COSMOS_PARTITION_KEY` (required) - partition key value
/// - `COSMOS_KEY` (optional) - account key; managed identity when unset
/// - `COSMOS_REQUEST_TIMEOUT_SECS` (optional, default: 30)
#[cfg(feature = "config")]
impl FromEnv for CosmosConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: env_required("COSMOS_ENDPOINT")?,
            database: env_required("COSMOS_DATABASE")?,
            container: env_required("COSMOS_CONTAINER")?,
            partition_key: env_required("COSMOS_PARTITION_KEY")?,
            key: env_optional("COSMOS_KEY"),
            request_timeout_secs: env_parse_or_default(
                "COSMOS_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?,
        })
    }
}

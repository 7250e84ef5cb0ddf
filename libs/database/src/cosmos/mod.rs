//! Cosmos DB (SQL API) client and utilities
//!
//! Talks to the account's REST interface directly: request signing,
//! client → database → container handles, and per-document operations
//! addressed by `(id, partition key)`.

mod auth;
mod client;
mod config;
mod error;
mod health;

pub use auth::{
    COSMOS_AAD_RESOURCE, Credential, IMDS_TOKEN_ENDPOINT, ManagedIdentityCredential, MasterKey,
};
pub use client::{
    API_VERSION, ContainerClient, CosmosClient, DatabaseClient, DatabaseProperties, PartitionKey,
};
pub use config::CosmosConfig;
pub use error::{CosmosError, CosmosResult};
pub use health::{HealthStatus, check_health, check_health_detailed};

// Re-export the status type carried by service errors
pub use reqwest::StatusCode;

//! Database library providing document-store connectors
//!
//! # Features
//!
//! - `cosmos` (default) - Azure Cosmos DB (SQL API) over REST
//! - `config` - Configuration support with `core_config::FromEnv`
//! - `all` - All features
//!
//! # Example
//!
//! ```ignore
//! use database::cosmos::{CosmosClient, CosmosConfig, PartitionKey};
//!
//! let config = CosmosConfig::from_env()?;
//! let container = CosmosClient::from_config(&config)?
//!     .database(config.database())
//!     .container(config.container());
//!
//! let pk = PartitionKey::new(config.partition_key());
//! container.upsert_document(&pk, &serde_json::json!({ "id": "p1" })).await?;
//! ```

#[cfg(feature = "cosmos")]
pub mod cosmos;

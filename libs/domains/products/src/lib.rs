//! Products Domain
//!
//! Product persistence behind a storage-agnostic repository trait, with a
//! Cosmos DB implementation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │ Repository  │  ← ProductRepository trait
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Cosmos    │  ← CosmosProductRepository (document mapping, not-found handling)
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← Product entity, ProductDocument storage shape
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use database::cosmos::CosmosConfig;
//! use domain_products::{CosmosProductRepository, Product, ProductRepository};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CosmosConfig::new(
//!     "https://my-account.documents.azure.com:443/",
//!     "catalog",
//!     "products",
//!     "products",
//! );
//! let repository = CosmosProductRepository::new(&config)?;
//!
//! repository.save(&Product::new("p1", "Widget", "A widget")).await?;
//! let found = repository.get_by_id("p1").await?;
//! assert!(found.is_some());
//! # Ok(())
//! # }
//! ```

pub mod cosmos;
pub mod error;
pub mod models;
pub mod repository;

// Re-export commonly used types
pub use cosmos::{to_document, to_domain, CosmosProductRepository};
pub use error::{ProductError, ProductResult};
pub use models::{Product, ProductDocument};
pub use repository::ProductRepository;

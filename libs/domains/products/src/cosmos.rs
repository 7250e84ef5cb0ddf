//! Cosmos DB implementation of ProductRepository

use async_trait::async_trait;
use database::cosmos::{ContainerClient, CosmosClient, CosmosConfig, PartitionKey};
use tracing::{debug, info, instrument};

use crate::error::{ensure_id, ProductResult};
use crate::models::{Product, ProductDocument};
use crate::repository::ProductRepository;

const LIST_QUERY: &str = "SELECT * FROM c";

/// Convert a product into its stored shape
pub fn to_document(product: &Product) -> ProductDocument {
    ProductDocument::from(product)
}

/// Convert a stored document back into a product
pub fn to_domain(document: ProductDocument) -> Product {
    Product::from(document)
}

/// Cosmos DB implementation of the ProductRepository
///
/// Every document is addressed by `(id, partition_key)` where the partition
/// key is the fixed value supplied at construction.
///
/// [`ProductDocument`] carries no partition-key field; the value travels only
/// in the `x-ms-documentdb-partitionkey` header. The target container must
/// therefore be provisioned so that every product belongs to the configured
/// partition, otherwise the service rejects writes whose header does not
/// match the partition-key path of the body.
#[derive(Debug, Clone)]
pub struct CosmosProductRepository {
    container: ContainerClient,
    partition_key: PartitionKey,
}

impl CosmosProductRepository {
    /// Build the client and resolve the container from configuration
    ///
    /// Performs no network I/O; an unreachable or misconfigured account
    /// surfaces on the first operation.
    pub fn new(config: &CosmosConfig) -> ProductResult<Self> {
        let container = CosmosClient::from_config(config)?
            .database(config.database())
            .container(config.container());

        Ok(Self::with_container(container, config.partition_key()))
    }

    /// Reuse an existing container handle
    pub fn with_container(container: ContainerClient, partition_key: impl Into<PartitionKey>) -> Self {
        Self {
            container,
            partition_key: partition_key.into(),
        }
    }

    /// Get the underlying container for advanced operations
    pub fn container(&self) -> &ContainerClient {
        &self.container
    }

    pub fn partition_key(&self) -> &PartitionKey {
        &self.partition_key
    }
}

#[async_trait]
impl ProductRepository for CosmosProductRepository {
    #[instrument(skip(self, product), fields(product_id = %product.id), err)]
    async fn create(&self, product: &Product) -> ProductResult<()> {
        ensure_id(&product.id)?;

        self.container
            .create_document(&self.partition_key, &to_document(product))
            .await?;

        info!(product_id = %product.id, "Product created successfully");
        Ok(())
    }

    #[instrument(skip(self, product), fields(product_id = %product.id), err)]
    async fn save(&self, product: &Product) -> ProductResult<()> {
        ensure_id(&product.id)?;

        self.container
            .upsert_document(&self.partition_key, &to_document(product))
            .await?;

        info!(product_id = %product.id, "Product saved successfully");
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&self, id: &str) -> ProductResult<Option<Product>> {
        ensure_id(id)?;

        match self
            .container
            .read_document::<ProductDocument>(id, &self.partition_key)
            .await
        {
            Ok(document) => Ok(Some(to_domain(document))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self), err)]
    async fn delete(&self, id: &str) -> ProductResult<()> {
        ensure_id(id)?;

        match self.container.delete_document(id, &self.partition_key).await {
            Ok(()) => {
                info!(product_id = %id, "Product deleted successfully");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!(product_id = %id, "Product already absent");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self), err)]
    async fn list(&self) -> ProductResult<Vec<Product>> {
        let documents = self
            .container
            .query_documents::<ProductDocument>(LIST_QUERY)
            .await?;

        Ok(documents.into_iter().map(to_domain).collect())
    }
}

use async_trait::async_trait;

use crate::error::ProductResult;
use crate::models::Product;

/// Repository trait for Product persistence
///
/// `create` and `get` are the minimal contract every backend satisfies; the
/// remaining operations form the full document-store surface. Absence is
/// always reported as `Ok(None)`, never as an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Persist a new product; an existing id is rejected by the store
    async fn create(&self, product: &Product) -> ProductResult<()>;

    /// Get a product by ID
    async fn get(&self, id: &str) -> ProductResult<Option<Product>> {
        self.get_by_id(id).await
    }

    /// Insert or fully replace a product
    async fn save(&self, product: &Product) -> ProductResult<()>;

    /// Get a product by ID
    async fn get_by_id(&self, id: &str) -> ProductResult<Option<Product>>;

    /// Delete a product by ID; deleting an absent product succeeds
    async fn delete(&self, id: &str) -> ProductResult<()>;

    /// List every stored product, in no particular order
    async fn list(&self) -> ProductResult<Vec<Product>>;
}

use database::cosmos::{CosmosError, StatusCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProductError {
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Any store failure other than "not found", passed through unchanged
    #[error(transparent)]
    Store(#[from] CosmosError),
}

pub type ProductResult<T> = Result<T, ProductError>;

impl ProductError {
    /// HTTP status of the underlying store failure, if any
    pub fn store_status(&self) -> Option<StatusCode> {
        match self {
            ProductError::Store(err) => err.status(),
            ProductError::Validation(_) => None,
        }
    }
}

/// Reject identities the store cannot address
///
/// Only the empty id is refused; whitespace is a legal id character.
pub(crate) fn ensure_id(id: &str) -> ProductResult<()> {
    if id.is_empty() {
        return Err(ProductError::Validation(
            "product id must not be empty".to_string(),
        ));
    }
    Ok(())
}

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::catalog::{CatalogRow, Listing};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("{message}")]
    Backend { message: String },
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl ProviderError {
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// Source of the rows shown by action nodes.
///
/// Implementations return the full, finite row set for a listing. An empty
/// result is not an error.
#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn fetch(&self, listing: Listing) -> Result<Vec<CatalogRow>, ProviderError>;
}

use std::fmt::Debug;

use async_trait::async_trait;
use thiserror::Error;

use crate::cache::DecodedKey;
use crate::mutate::CacheData;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CacheError {
    #[error("Cache write failed for {key}: {message}")]
    Write { key: String, message: String },
    #[error("Revalidation failed for {key}: {message}")]
    Revalidate { key: String, message: String },
}

/// Computes the new value of one entry from its current value.
pub type Mutator = Box<dyn FnOnce(Option<CacheData>) -> Option<CacheData> + Send>;

/// Binding to the cache holding query results.
///
/// `mutate` must run the mutator against the value present at that moment
/// and store its result atomically for that key.
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    type Key: Clone + Debug + Send + Sync + 'static;

    fn cache_keys(&self) -> Vec<Self::Key>;

    /// `None` when the key is not a query key.
    fn decode(&self, key: &Self::Key) -> Option<DecodedKey>;

    async fn mutate(&self, key: &Self::Key, mutator: Mutator) -> Result<(), CacheError>;

    async fn revalidate(&self, key: &Self::Key) -> Result<(), CacheError>;
}

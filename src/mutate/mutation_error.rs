use thiserror::Error;

use crate::cache::CacheError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MutationError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("Cache task failed: {0}")]
    Task(String),
}

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::trace;

use crate::filter::{QueryFilter, RowFilter};
use crate::select::ParseError;

/// Source of row filters for cached query keys.
pub trait FilterProvider: Send + Sync {
    fn filter_for(&self, query_key: &str) -> Result<Arc<dyn RowFilter>, ParseError>;
}

/// Builds a `QueryFilter` per query key and keeps it for later lookups.
#[derive(Default)]
pub struct CachedFilterProvider {
    filters: RwLock<HashMap<String, Arc<QueryFilter>>>,
}

impl CachedFilterProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.filters.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_shared(self) -> Arc<dyn FilterProvider> {
        Arc::new(self)
    }
}

impl FilterProvider for CachedFilterProvider {
    fn filter_for(&self, query_key: &str) -> Result<Arc<dyn RowFilter>, ParseError> {
        if let Some(filter) = self.filters.read().unwrap_or_else(PoisonError::into_inner).get(query_key) {
            trace!(query_key, "filter cache hit");
            return Ok(filter.clone());
        }

        trace!(query_key, "filter cache miss");
        let filter = Arc::new(QueryFilter::from_query_key(query_key)?);
        self.filters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(query_key.to_string(), filter.clone());
        Ok(filter)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::filter::{CachedFilterProvider, FilterProvider};

    #[test]
    pub fn test_filter_for_caches_by_query_key() {
        let provider = CachedFilterProvider::new();

        let first = provider.filter_for("select=id&id=eq.1").expect("Failed to build filter");
        let second = provider.filter_for("select=id&id=eq.1").expect("Failed to build filter");

        assert_eq!(provider.len(), 1);
        assert!(first.apply(&json!({ "id": 1 })));
        assert!(second.apply(&json!({ "id": 1 })));
    }

    #[test]
    pub fn test_filter_for_propagates_parse_errors() {
        let provider = CachedFilterProvider::new();

        assert!(provider.filter_for("select=id&id=nope.1").is_err());
        assert!(provider.is_empty());
    }
}

use std::fs;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info};

use crate::cache::{CacheError, CacheStore, DecodedKey, Mutator};
use crate::config::EngineConfig;
use crate::mutate::CacheData;

/// In-process cache store keyed by encoded query keys. Revalidation only
/// records the key; nothing is refetched.
#[derive(Debug, Default)]
pub struct MemoryCache {
    config: EngineConfig,
    entries: RwLock<IndexMap<String, CacheData>>,
    revalidated: RwLock<Vec<String>>,
}

impl MemoryCache {
    pub fn new(config: EngineConfig) -> Self {
        Self { config, ..Default::default() }
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn insert(&self, key: &str, data: CacheData) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), data);
    }

    /// Stores `data` under the encoded form of `key`, returning that form.
    pub fn insert_decoded(&self, key: &DecodedKey, data: CacheData) -> String {
        let encoded = key.encode(&self.config);
        self.insert(&encoded, data);
        encoded
    }

    pub fn get(&self, key: &str) -> Option<CacheData> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys revalidated so far, in call order, repeats included.
    pub fn revalidated_keys(&self) -> Vec<String> {
        self.revalidated.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Seeds entries from a JSON object mapping keys to cached values.
    /// Values that are not a known cache shape are skipped.
    pub fn load_from_file(&self, file_path: impl AsRef<Path>) -> Result<usize, String> {
        let file_path = file_path.as_ref();
        let file_path_lossy = file_path.to_string_lossy();

        let content = fs::read_to_string(file_path).map_err(|_| format!("Could not read file {}", file_path_lossy))?;
        let Value::Object(map) = serde_json::from_str::<Value>(&content)
            .map_err(|_| format!("File {} does not contain valid JSON", file_path_lossy))?
        else {
            return Err(format!("File {} does not contain a JSON object", file_path_lossy));
        };

        let mut loaded = 0;
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for (key, value) in map {
            if let Some(data) = CacheData::from_value(value) {
                entries.insert(key, data);
                loaded += 1;
            }
        }

        info!(loaded, file = %file_path_lossy, "cache entries loaded");
        Ok(loaded)
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    type Key = String;

    fn cache_keys(&self) -> Vec<String> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect()
    }

    fn decode(&self, key: &String) -> Option<DecodedKey> {
        DecodedKey::decode(key, &self.config)
    }

    async fn mutate(&self, key: &String, mutator: Mutator) -> Result<(), CacheError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let current = entries.get(key).cloned();
        match mutator(current) {
            Some(data) => {
                entries.insert(key.clone(), data);
            }
            None => {
                entries.shift_remove(key);
            }
        }
        debug!(key = %key, "cache entry mutated");
        Ok(())
    }

    async fn revalidate(&self, key: &String) -> Result<(), CacheError> {
        self.revalidated.write().unwrap_or_else(PoisonError::into_inner).push(key.clone());
        debug!(key = %key, "cache entry revalidated");
        Ok(())
    }
}

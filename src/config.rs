use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Engine-wide settings: cache key layout and mutation defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Marker segment identifying keys managed by this engine.
    pub key_prefix: String,
    pub key_separator: String,
    /// Page size used to rechunk paginated entries whose key has no limit.
    pub default_limit: usize,
    /// Schema assumed when a revalidation rule does not name one.
    pub default_schema: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            key_prefix: "postgrest".to_string(),
            key_separator: "$".to_string(),
            default_limit: 1000,
            default_schema: "public".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn with_default_schema(mut self, schema: &str) -> Self {
        self.default_schema = schema.to_string();
        self
    }

    /// Missing fields fall back to their defaults.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load_from_file(file_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file_path = file_path.as_ref();
        let content = fs::read_to_string(file_path).map_err(|source| ConfigError::Io {
            path: file_path.to_string_lossy().into_owned(),
            source,
        })?;
        Self::from_json_str(&content)
    }
}

pub mod select;
pub use select::{parse_select, ParseError, Path};

pub mod builder;
pub use builder::{build_select_statement, DedupePolicy, GroupedPath, SelectStatement};

pub mod filter;
pub use filter::{parse_query_key, FilterDefinition, FilterProvider, OrderDefinition, QueryFilter, RowFilter};

pub mod normalizer;
pub use normalizer::{denormalize, normalize_query, normalize_response, NormalizedQuery, TableQuery};

pub mod mutate;
pub use mutate::{mutate_item, CacheData, ItemMutation, MutateItemCache, MutationError, RevalidateOpts};

pub mod cache;
pub use cache::{CacheError, CacheStore, DecodedKey, MemoryCache};

pub mod config;
pub use config::{ConfigError, EngineConfig};

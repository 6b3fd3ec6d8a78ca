pub mod decoded_key;
pub use decoded_key::*;

pub mod cache_store;
pub use cache_store::*;

pub mod memory_cache;
pub use memory_cache::*;

pub mod denormalizer;
pub use denormalizer::*;

pub mod response_normalizer;
pub use response_normalizer::*;

pub mod table_query;
pub use table_query::*;

pub mod query_normalizer;
pub use query_normalizer::*;

pub mod cache_data;
pub use cache_data::*;

pub mod find_index_ordered;
pub use find_index_ordered::*;

pub mod operations;
pub use operations::*;

pub mod revalidate;
pub use revalidate::*;

pub mod mutation_error;
pub use mutation_error::*;

pub mod mutate_item;
pub use mutate_item::*;

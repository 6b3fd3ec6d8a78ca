pub mod value_compare;
pub use value_compare::*;

pub mod filter_definition;
pub use filter_definition::*;

pub mod order_definition;
pub use order_definition::*;

pub mod query_key;
pub use query_key::*;

pub mod row_values;
pub use row_values::*;

pub mod row_filter;
pub use row_filter::*;

pub mod query_filter;
pub use query_filter::*;

pub mod filter_provider;
pub use filter_provider::*;

pub mod grouped_path;
pub use grouped_path::*;

pub mod dedupe_policy;
pub use dedupe_policy::*;

pub mod select_tree;
pub use select_tree::*;

pub mod select_statement;
pub use select_statement::*;

pub mod path;
pub use path::*;

pub mod parse_error;
pub use parse_error::*;

pub mod select_parser;
pub use select_parser::*;

pub mod select_field;
pub use select_field::*;

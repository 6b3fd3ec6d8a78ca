use crate::filter::{FilterDefinitions, ParsedQuery, parse_query_key};
use crate::select::{ParseError, Path};

/// Selection and filters of one live query against a table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableQuery {
    pub paths: Vec<Path>,
    pub filters: FilterDefinitions,
}

impl TableQuery {
    pub fn new(paths: Vec<Path>, filters: FilterDefinitions) -> Self {
        Self { paths, filters }
    }

    pub fn from_query_key(query_key: &str) -> Result<Self, ParseError> {
        Ok(parse_query_key(query_key)?.into())
    }
}

impl From<ParsedQuery> for TableQuery {
    fn from(parsed: ParsedQuery) -> Self {
        Self { paths: parsed.paths, filters: parsed.filters }
    }
}

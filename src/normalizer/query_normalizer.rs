use serde_json::Value;
use tracing::debug;

use crate::builder::{GroupedPath, build_select_statement};
use crate::filter::extract_paths_from_filters;
use crate::normalizer::{TableQuery, denormalize, normalize_response};
use crate::select::{ParseError, Path, parse_select, remove_alias_from_declaration};

/// The statement to fetch plus what is needed to reshape its response.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedQuery {
    pub select_query: String,
    /// Paths of the caller's own select clause, aliases included.
    pub user_query_paths: Option<Vec<Path>>,
    /// Alias-free paths folded into `select_query`.
    pub paths: Vec<Path>,
    pub grouped_paths: Vec<GroupedPath>,
}

impl NormalizedQuery {
    /// Reshapes a response to `select_query` into the caller's select shape.
    /// Without a caller select the merged paths are used.
    pub fn denormalize_response(&self, response: &Value) -> Value {
        let flat = normalize_response(&self.grouped_paths, response);
        match &self.user_query_paths {
            Some(paths) => denormalize(paths, &flat),
            None => denormalize(&self.paths, &flat),
        }
    }
}

/// Folds the caller's select clause with every path the live queries on the
/// same table need (their filter columns first, then their selections) into
/// one statement.
///
/// With `disabled` set the caller's clause is used as is. Returns `None`
/// when there is nothing to select.
pub fn normalize_query<F, I>(query: Option<&str>, disabled: bool, queries_for_table: F) -> Result<Option<NormalizedQuery>, ParseError>
where
    F: FnOnce() -> I,
    I: IntoIterator<Item = TableQuery>,
{
    let user_query_paths = query.map(parse_select).transpose()?;

    let mut paths: Vec<Path> = user_query_paths
        .iter()
        .flatten()
        .map(Path::without_alias)
        .collect();

    if disabled {
        let Some(query) = query.filter(|query| !query.trim().is_empty()) else {
            return Ok(None);
        };
        let grouped_paths = build_select_statement(user_query_paths.as_deref().unwrap_or_default()).grouped_paths;
        return Ok(Some(NormalizedQuery {
            select_query: query.to_string(),
            user_query_paths,
            paths,
            grouped_paths,
        }));
    }

    for table_query in queries_for_table() {
        for filter_path in extract_paths_from_filters(&table_query.filters) {
            let path = table_query
                .paths
                .iter()
                .find(|p| p.path == filter_path.path && p.alias == filter_path.alias)
                .map(Path::without_alias)
                .unwrap_or_else(|| Path::from_path(&filter_path.path));
            push_unique(&mut paths, path);
        }

        for path in &table_query.paths {
            if !path.is_aggregate() {
                push_unique(&mut paths, path.without_alias());
            }
        }
    }

    let statement = build_select_statement(&paths);
    if statement.is_empty() {
        return Ok(None);
    }

    debug!(select_query = %statement.statement, paths = paths.len(), "normalized query");

    Ok(Some(NormalizedQuery {
        select_query: statement.statement,
        user_query_paths,
        paths,
        grouped_paths: statement.grouped_paths,
    }))
}

fn push_unique(paths: &mut Vec<Path>, path: Path) {
    let declaration = remove_alias_from_declaration(&path.declaration);
    if paths.iter().all(|p| remove_alias_from_declaration(&p.declaration) != declaration) {
        paths.push(path);
    }
}

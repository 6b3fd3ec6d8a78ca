use serde_json::Value;

use crate::filter::{FilterDefinitions, RowFilter, RowValues, parse_query_key};
use crate::normalizer::denormalize;
use crate::select::{ParseError, Path};

/// Row filter for one cached query, built from its selection and filters.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFilter {
    paths: Vec<Path>,
    filters: FilterDefinitions,
}

impl QueryFilter {
    pub fn new(paths: Vec<Path>, filters: FilterDefinitions) -> Self {
        Self { paths, filters }
    }

    pub fn from_query_key(query_key: &str) -> Result<Self, ParseError> {
        let parsed = parse_query_key(query_key)?;
        Ok(Self::new(parsed.paths, parsed.filters))
    }

    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    pub fn filters(&self) -> &FilterDefinitions {
        &self.filters
    }

    fn has_paths(&self, row: &Value) -> bool {
        self.paths
            .iter()
            .filter(|path| !path.is_wildcard() && !path.is_aggregate())
            .all(|path| RowValues::has_path(row, &path.output_path()))
    }

    fn passes_filters(&self, row: &Value) -> bool {
        self.filters.iter().all(|filter| filter.matches(row))
    }
}

impl RowFilter for QueryFilter {
    fn apply(&self, row: &Value) -> bool {
        self.has_paths(row) && self.passes_filters(row)
    }

    fn apply_filters(&self, rows: Vec<Value>) -> Vec<Value> {
        rows.into_iter().filter(|row| self.passes_filters(row)).collect()
    }

    fn denormalize(&self, row: &Value) -> Value {
        denormalize(&self.paths, row)
    }

    fn has_filters_on_paths(&self, paths: &[String]) -> bool {
        self.filters.iter().any(|filter| filter.restrict_to_paths(paths).is_some())
    }

    fn apply_filters_on_paths(&self, row: &Value, paths: &[String]) -> bool {
        self.filters
            .iter()
            .filter_map(|filter| filter.restrict_to_paths(paths))
            .all(|filter| filter.matches(row))
    }

    fn has_wildcard_path(&self) -> bool {
        self.paths.iter().any(Path::is_wildcard)
    }

    fn has_aggregate_path(&self) -> bool {
        self.paths.iter().any(Path::is_aggregate)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::filter::{QueryFilter, RowFilter};

    fn filter(query_key: &str) -> QueryFilter {
        QueryFilter::from_query_key(query_key).expect("Failed to build filter")
    }

    #[test]
    pub fn test_apply_requires_paths_and_filters() {
        let filter = filter("select=id,status,assignee:assignee_id(name)&status=eq.open");

        assert!(filter.apply(&json!({ "id": 1, "status": "open", "assignee": { "name": "Ann" } })));
        assert!(filter.apply(&json!({ "id": 1, "status": "open", "assignee": null })));
        assert!(!filter.apply(&json!({ "id": 1, "status": "closed", "assignee": null })));
        assert!(!filter.apply(&json!({ "id": 1, "status": "open" })));
    }

    #[test]
    pub fn test_apply_filters_keeps_matching_rows() {
        let filter = filter("select=id,score&score=gte.10");

        let rows = filter.apply_filters(vec![json!({ "id": 1, "score": 5 }), json!({ "id": 2, "score": 12 })]);

        assert_eq!(rows, vec![json!({ "id": 2, "score": 12 })]);
    }

    #[test]
    pub fn test_filters_on_paths() {
        let filter = filter("select=id,status&id=eq.1&status=eq.open");
        let pks = vec!["id".to_string()];

        assert!(filter.has_filters_on_paths(&pks));
        assert!(filter.apply_filters_on_paths(&json!({ "id": 1, "status": "closed" }), &pks));
        assert!(!filter.apply_filters_on_paths(&json!({ "id": 2 }), &pks));
        assert!(!filter.has_filters_on_paths(&["name".to_string()]));
    }

    #[test]
    pub fn test_denormalize_input_into_select_shape() {
        let filter = filter("select=id,author:author_id(name)");

        let row = filter.denormalize(&json!({ "id": 1, "author_id.name": "Ann", "title": "x" }));

        assert_eq!(row, json!({ "id": 1, "author": { "name": "Ann" } }));
    }

    #[test]
    pub fn test_wildcard_and_aggregate_flags() {
        assert!(filter("select=*").has_wildcard_path());
        assert!(filter("select=id,tags(count)").has_aggregate_path());
        assert!(!filter("select=id").has_wildcard_path());
        assert!(!filter("select=id").has_aggregate_path());
    }
}

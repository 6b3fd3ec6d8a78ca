use serde_json::Value;

/// What the mutation engine needs to know about a cached query to patch its
/// rows locally.
pub trait RowFilter: Send + Sync {
    /// The row carries every selected path and passes every filter.
    fn apply(&self, row: &Value) -> bool;

    /// Keeps the rows that pass every filter. Selected paths are not checked.
    fn apply_filters(&self, rows: Vec<Value>) -> Vec<Value>;

    /// Reshapes a canonical-path input into the query's select shape.
    fn denormalize(&self, row: &Value) -> Value;

    fn has_filters_on_paths(&self, paths: &[String]) -> bool;

    /// Applies only the filters on `paths`.
    fn apply_filters_on_paths(&self, row: &Value, paths: &[String]) -> bool;

    fn has_wildcard_path(&self) -> bool;

    fn has_aggregate_path(&self) -> bool;
}

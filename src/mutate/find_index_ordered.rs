use std::cmp::Ordering;

use serde_json::Value;

use crate::filter::OrderDefinition;

/// Index at which `row` keeps `rows` sorted by `order_by`, after any rows
/// that compare equal. `rows` must already be sorted.
pub fn find_index_ordered(row: &Value, rows: &[Value], order_by: &[OrderDefinition]) -> usize {
    rows.partition_point(|current| OrderDefinition::compare_rows(order_by, current, row) != Ordering::Greater)
}

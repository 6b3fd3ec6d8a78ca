use std::sync::Arc;

use serde_json::Value;

use crate::filter::{OrderDefinition, RowFilter};
use crate::mutate::{CacheData, find_index_ordered};

pub type RowMutator = Arc<dyn Fn(&Value) -> Value + Send + Sync>;
/// `(current, input) -> merged`
pub type RowMerger = Arc<dyn Fn(&Value, &Value) -> Value + Send + Sync>;
pub type RowTransformer = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// What a cached query contributes to a row patch.
pub struct PatchContext<'a> {
    pub primary_keys: &'a [String],
    pub filter: &'a dyn RowFilter,
    pub order_by: &'a [OrderDefinition],
    pub transformer: Option<&'a (dyn Fn(Value) -> Value + Send + Sync)>,
}

impl PatchContext<'_> {
    fn position(&self, row: &Value, rows: &[Value]) -> usize {
        if self.order_by.is_empty() {
            return 0;
        }
        find_index_ordered(row, rows, self.order_by)
    }

    fn transform(&self, row: Value) -> Value {
        match self.transformer {
            Some(transformer) => transformer(row),
            None => row,
        }
    }

    /// Puts `row` back in place if it still belongs to the query.
    fn reinsert(&self, row: Value, rows: &mut Vec<Value>) {
        if !self.filter.apply(&row) {
            return;
        }
        let position = self.position(&row, rows);
        rows.insert(position, self.transform(row));
    }
}

pub fn matches_primary_keys(row: &Value, input: &Value, primary_keys: &[String]) -> bool {
    primary_keys.iter().all(|pk| match (row.get(pk), input.get(pk)) {
        (Some(current), Some(expected)) => current == expected,
        _ => false,
    })
}

/// Updates the row matching `input` by primary key, moving it to its
/// ordered position, or dropping it when it no longer passes the filter.
/// Rows are returned unchanged when nothing matches.
pub fn mutate_operation(
    input: &Value,
    mutate: &dyn Fn(&Value) -> Value,
    mut rows: Vec<Value>,
    ctx: &PatchContext<'_>,
) -> Vec<Value> {
    let Some(idx) = rows.iter().position(|row| matches_primary_keys(row, input, ctx.primary_keys)) else {
        return rows;
    };

    let current = rows.remove(idx);
    ctx.reinsert(mutate(&current), &mut rows);
    rows
}

/// Replaces the row matching `input`, or inserts `input` when none does.
/// Without a merge function the input's fields are laid over the current row.
pub fn upsert_operation(
    input: &Value,
    merge: Option<&(dyn Fn(&Value, &Value) -> Value + Send + Sync)>,
    mut rows: Vec<Value>,
    ctx: &PatchContext<'_>,
) -> Vec<Value> {
    let row = match rows.iter().position(|row| matches_primary_keys(row, input, ctx.primary_keys)) {
        Some(idx) => {
            let current = rows.remove(idx);
            merge_row(&current, input, merge)
        }
        None => input.clone(),
    };

    ctx.reinsert(row, &mut rows);
    rows
}

pub fn delete_operation(input: &Value, mut rows: Vec<Value>, primary_keys: &[String]) -> Vec<Value> {
    rows.retain(|row| !matches_primary_keys(row, input, primary_keys));
    rows
}

fn merge_row(current: &Value, input: &Value, merge: Option<&(dyn Fn(&Value, &Value) -> Value + Send + Sync)>) -> Value {
    if let Some(merge) = merge {
        return merge(current, input);
    }
    match (current, input) {
        (Value::Object(current), Value::Object(input)) => {
            let mut merged = current.clone();
            for (key, value) in input {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => input.clone(),
    }
}

/// A row change, applied to one cached value at a time.
#[derive(Clone)]
pub enum RowChange {
    Mutate(RowMutator),
    Upsert { merge: Option<RowMerger> },
    Delete,
}

impl RowChange {
    /// Applies the change to a cached value. List shapes are flattened,
    /// patched and rechunked by `limit`; a single row is patched directly
    /// and becomes null when it drops out of the query.
    pub fn apply(&self, input: &Value, data: CacheData, limit: usize, ctx: &PatchContext<'_>) -> CacheData {
        if let Some(rows) = data.flatten() {
            let rows = match self {
                RowChange::Mutate(mutate) => mutate_operation(input, mutate.as_ref(), rows, ctx),
                RowChange::Upsert { merge } => upsert_operation(input, merge.as_deref(), rows, ctx),
                RowChange::Delete => delete_operation(input, rows, ctx.primary_keys),
            };
            return data.rechunk(rows, limit);
        }

        match data {
            CacheData::Response { data, count } => CacheData::Response { data: self.apply_single(input, data, ctx), count },
            other => other,
        }
    }

    fn apply_single(&self, input: &Value, current: Value, ctx: &PatchContext<'_>) -> Value {
        if current.is_null() {
            return current;
        }

        let updated = match self {
            RowChange::Mutate(mutate) => mutate(&current),
            RowChange::Upsert { merge } if matches_primary_keys(&current, input, ctx.primary_keys) => {
                merge_row(&current, input, merge.as_deref())
            }
            RowChange::Delete if matches_primary_keys(&current, input, ctx.primary_keys) => return Value::Null,
            _ => return current,
        };

        if ctx.filter.apply(&updated) { updated } else { Value::Null }
    }
}

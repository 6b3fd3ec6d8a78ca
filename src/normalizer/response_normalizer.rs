use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::builder::GroupedPath;
use crate::select::bare_name;

/// Flattens an API response fetched with a built statement into rows keyed
/// by dotted canonical path. Dedupe and explicit aliases are read back from
/// `grouped_paths`; to-many relations stay arrays of flattened rows.
pub fn normalize_response(grouped_paths: &[GroupedPath], response: &Value) -> Value {
    match response {
        Value::Array(rows) => Value::Array(rows.iter().map(|row| normalize_response(grouped_paths, row)).collect()),
        Value::Object(row) => {
            let mut out = Map::new();
            normalize_into(grouped_paths, row, "", &mut out);
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn response_key(grouped: &GroupedPath) -> &str {
    grouped.alias().unwrap_or_else(|| bare_name(grouped.path()))
}

fn normalize_into(grouped_paths: &[GroupedPath], row: &Map<String, Value>, prefix: &str, out: &mut Map<String, Value>) {
    // response keys read by an explicit sibling; a wildcard leaves them alone
    let claimed: HashSet<&str> = grouped_paths
        .iter()
        .filter(|grouped| grouped.path() != "*")
        .map(response_key)
        .collect();

    for grouped in grouped_paths {
        if grouped.path() == "*" {
            for (key, value) in row {
                if !claimed.contains(key.as_str()) {
                    out.insert(format!("{}{}", prefix, key), value.clone());
                }
            }
            continue;
        }

        let Some(value) = row.get(response_key(grouped)) else {
            continue;
        };
        let key = format!("{}{}", prefix, grouped.path());

        match grouped {
            GroupedPath::Leaf(_) => {
                out.insert(key, value.clone());
            }
            GroupedPath::Nested(nested) => match value {
                Value::Object(related) => normalize_into(&nested.paths, related, &format!("{}.", key), out),
                Value::Array(_) => {
                    out.insert(key, normalize_response(&nested.paths, value));
                }
                other => {
                    out.insert(key, other.clone());
                }
            },
        }
    }
}

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::select::{Path, bare_name, strip_hints_from_path};

/// A path split into the response key chain and the output key chain.
struct Route {
    path: Vec<String>,
    output: Vec<String>,
}

impl Route {
    fn from_path(path: &Path) -> Self {
        let segments: Vec<String> = path.path.split('.').map(str::to_string).collect();
        let mut output: Vec<String> = path.output_path().split('.').map(str::to_string).collect();
        if output.len() != segments.len() {
            output = strip_hints_from_path(&path.path).split('.').map(str::to_string).collect();
        }
        Self { path: segments, output }
    }
}

/// Reshapes a response keyed by canonical paths into the alias tree the
/// paths declare. The response may be nested, flat with dotted keys, or a
/// mix of both; arrays of rows are mapped element-wise.
///
/// A null relation becomes null and an empty to-many relation an empty
/// array, without descending further. Paths with no value in the response
/// are left out.
pub fn denormalize(paths: &[Path], response: &Value) -> Value {
    let routes: Vec<Route> = paths.iter().map(Route::from_path).collect();
    let routes: Vec<&Route> = routes.iter().collect();
    denormalize_value(&routes, 0, response)
}

fn denormalize_value(routes: &[&Route], depth: usize, value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(denormalize_object(routes, depth, map)),
        Value::Array(items) => Value::Array(items.iter().map(|item| denormalize_value(routes, depth, item)).collect()),
        other => other.clone(),
    }
}

fn denormalize_object(routes: &[&Route], depth: usize, source: &Map<String, Value>) -> Map<String, Value> {
    let mut groups: IndexMap<(&str, &str), Vec<&Route>> = IndexMap::new();
    for route in routes {
        if depth < route.path.len() {
            let key = (route.path[depth].as_str(), route.output[depth].as_str());
            groups.entry(key).or_default().push(*route);
        }
    }

    // response keys claimed by an explicit path at this level
    let claimed: HashSet<&str> = groups.keys().map(|(segment, _)| bare_name(*segment)).collect();

    let mut out = Map::new();
    // keys written by a relation; a plain column never overwrites them
    let mut nested_keys: HashSet<String> = HashSet::new();

    for ((segment, output_key), members) in groups {
        let (leaves, nested): (Vec<&Route>, Vec<&Route>) =
            members.into_iter().partition(|route| route.path.len() == depth + 1);

        if !leaves.is_empty() && !nested_keys.contains(output_key) {
            if segment == "*" {
                for (key, value) in source {
                    let head = key.split('.').next().unwrap_or(key);
                    if !claimed.contains(bare_name(head)) && !nested_keys.contains(key) && !out.contains_key(key) {
                        out.insert(key.clone(), value.clone());
                    }
                }
            } else if let Some(value) = lookup(source, segment) {
                out.insert(output_key.to_string(), value.clone());
            }
        }

        if nested.is_empty() {
            continue;
        }

        let resolved = match lookup(source, segment) {
            Some(Value::Null) => Some(Value::Null),
            Some(Value::Array(items)) => Some(Value::Array(
                items.iter().map(|item| denormalize_value(&nested, depth + 1, item)).collect(),
            )),
            Some(Value::Object(map)) => Some(Value::Object(denormalize_object(&nested, depth + 1, map))),
            _ => flat_prefix(source, segment).map(|map| Value::Object(denormalize_object(&nested, depth + 1, &map))),
        };

        if let Some(value) = resolved {
            out.insert(output_key.to_string(), value);
            nested_keys.insert(output_key.to_string());
        }
    }

    out
}

fn lookup<'a>(source: &'a Map<String, Value>, segment: &str) -> Option<&'a Value> {
    source.get(segment).or_else(|| source.get(bare_name(segment)))
}

/// Entries stored under `segment.` keys, re-keyed relative to `segment`.
fn flat_prefix(source: &Map<String, Value>, segment: &str) -> Option<Map<String, Value>> {
    let prefix = format!("{}.", segment);
    let map: Map<String, Value> = source
        .iter()
        .filter_map(|(key, value)| key.strip_prefix(&prefix).map(|rest| (rest.to_string(), value.clone())))
        .collect();
    (!map.is_empty()).then_some(map)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::normalizer::denormalize;
    use crate::select::{Path, parse_select};

    #[test]
    pub fn test_denormalize_nested_alias_from_flat_keys() {
        let paths = parse_select("note_id(test,relation_id,rel:relation_id(test))").expect("Failed to parse select");

        let result = denormalize(&paths, &json!({
            "test": "123",
            "some": "456",
            "value": "789",
            "note_id.test": "123",
            "note_id.relation_id": "id",
            "note_id.relation_id.test": "345",
        }));

        assert_eq!(result, json!({
            "note_id": {
                "test": "123",
                "relation_id": "id",
                "rel": { "test": "345" },
            },
        }));
    }

    #[test]
    pub fn test_denormalize_multiple_fkeys_to_same_table() {
        let paths = parse_select(
            "created_by:employee!created_by_employee_id(display_name),updated_by:employee!updated_by_employee_id(display_name)",
        )
        .expect("Failed to parse select");

        let result = denormalize(&paths, &json!({
            "employee!created_by_employee_id.display_name": "one",
            "employee!updated_by_employee_id.display_name": "two",
        }));

        assert_eq!(result, json!({
            "created_by": { "display_name": "one" },
            "updated_by": { "display_name": "two" },
        }));
    }

    #[test]
    pub fn test_denormalize_null_relation() {
        let paths = vec![Path::new("assignee:assignee_id.id", "assignee_id.id", Some("assignee.id"))];

        let result = denormalize(&paths, &json!({ "assignee_id": null }));

        assert_eq!(result, json!({ "assignee": null }));
    }

    #[test]
    pub fn test_denormalize_empty_to_many_relation() {
        let paths = vec![
            Path::new("tags:tag.id", "tag.id", Some("tags.id")),
            Path::new("tags:tag.name", "tag.name", Some("tags.name")),
            Path::new("tags:tag.color", "tag.color", Some("tags.color")),
        ];

        let result = denormalize(&paths, &json!({ "tag": [] }));

        assert_eq!(result, json!({ "tags": [] }));
    }

    #[test]
    pub fn test_denormalize_nested_response_and_arrays() {
        let paths = parse_select("id,assignee:assignee_id(id,name:display_name),tags:tag(id,tag_name:name)")
            .expect("Failed to parse select");

        let result = denormalize(&paths, &json!({
            "id": 1,
            "assignee_id": { "id": 7, "display_name": "Ann", "extra": true },
            "tag": [{ "id": 1, "name": "a" }, { "id": 2, "name": "b" }],
            "unrelated": "x",
        }));

        assert_eq!(result, json!({
            "id": 1,
            "assignee": { "id": 7, "name": "Ann" },
            "tags": [{ "id": 1, "tag_name": "a" }, { "id": 2, "tag_name": "b" }],
        }));
    }

    #[test]
    pub fn test_denormalize_skips_missing_and_keeps_wildcard() {
        let paths = parse_select("*,inbox:inbox_id(name)").expect("Failed to parse select");

        let result = denormalize(&paths, &json!({ "id": 1, "status": "open", "inbox_id": { "name": "Main" } }));

        assert_eq!(result, json!({ "id": 1, "status": "open", "inbox": { "name": "Main" } }));

        let paths = parse_select("id,status").expect("Failed to parse select");
        assert_eq!(denormalize(&paths, &json!({ "id": 1 })), json!({ "id": 1 }));
    }

    #[test]
    pub fn test_denormalize_rows() {
        let paths = parse_select("id,label:name").expect("Failed to parse select");

        let result = denormalize(&paths, &json!([{ "id": 1, "name": "a" }, { "id": 2, "name": "b" }]));

        assert_eq!(result, json!([{ "id": 1, "label": "a" }, { "id": 2, "label": "b" }]));
    }
}

use serde_json::Value;

/// Dotted-path access into rows. An exact dotted key (`"a.b"`) on an object
/// wins over descending into `a`; arrays are traversed element-wise.
pub struct RowValues;

impl RowValues {
    pub fn resolve<'a>(row: &'a Value, path: &str) -> Vec<&'a Value> {
        let segments: Vec<&str> = path.split('.').collect();
        let mut out = vec![];
        Self::collect(row, &segments, &mut out);
        out
    }

    fn collect<'a>(value: &'a Value, segments: &[&str], out: &mut Vec<&'a Value>) {
        if segments.is_empty() {
            out.push(value);
            return;
        }

        match value {
            Value::Object(map) => {
                if segments.len() > 1 {
                    if let Some(found) = map.get(&segments.join(".")) {
                        out.push(found);
                        return;
                    }
                }
                if let Some(found) = map.get(segments[0]) {
                    Self::collect(found, &segments[1..], out);
                }
            }
            Value::Array(items) => {
                for item in items {
                    Self::collect(item, segments, out);
                }
            }
            _ => {}
        }
    }

    /// Whether the row carries a value (null included) for `path`. A null
    /// relation or an empty to-many relation counts as present.
    pub fn has_path(row: &Value, path: &str) -> bool {
        let segments: Vec<&str> = path.split('.').collect();
        Self::has_segments(row, &segments)
    }

    fn has_segments(value: &Value, segments: &[&str]) -> bool {
        if segments.is_empty() {
            return true;
        }

        match value {
            Value::Null => true,
            Value::Object(map) => {
                if segments.len() > 1 && map.contains_key(&segments.join(".")) {
                    return true;
                }
                map.get(segments[0])
                    .is_some_and(|found| Self::has_segments(found, &segments[1..]))
            }
            Value::Array(items) => items.iter().all(|item| Self::has_segments(item, segments)),
            _ => false,
        }
    }
}

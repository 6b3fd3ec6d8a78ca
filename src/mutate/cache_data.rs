use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// One page of a "load more" list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HasMorePage {
    pub data: Vec<Value>,
    #[serde(rename = "hasMore")]
    pub has_more: bool,
}

/// The shapes a cached query result can take.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheData {
    /// A plain response. `data` is an array of rows or a single row (or null).
    Response { data: Value, count: Option<i64> },
    /// Offset pagination, one vec per page.
    Pages(Vec<Vec<Value>>),
    /// Pages with a has-more flag.
    HasMorePages(Vec<HasMorePage>),
}

impl CacheData {
    /// Classifies a raw cached value. `None` for unknown shapes.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Array(items) => {
                if items.is_empty() {
                    return Some(CacheData::Pages(vec![]));
                }
                if items.iter().all(is_has_more_page) {
                    let pages = items
                        .into_iter()
                        .map(serde_json::from_value::<HasMorePage>)
                        .collect::<Result<Vec<_>, _>>()
                        .ok()?;
                    return Some(CacheData::HasMorePages(pages));
                }
                if items.iter().all(Value::is_array) {
                    let pages = items
                        .into_iter()
                        .map(|page| match page {
                            Value::Array(rows) => rows,
                            _ => vec![],
                        })
                        .collect();
                    return Some(CacheData::Pages(pages));
                }
                None
            }
            Value::Object(mut map) => {
                let data = map.remove("data")?;
                let count = map.get("count").and_then(Value::as_i64);
                Some(CacheData::Response { data, count })
            }
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            CacheData::Response { data, count } => {
                let mut map = Map::new();
                map.insert("data".to_string(), data);
                map.insert("count".to_string(), count.map(Value::from).unwrap_or(Value::Null));
                Value::Object(map)
            }
            CacheData::Pages(pages) => json!(pages),
            CacheData::HasMorePages(pages) => serde_json::to_value(pages).unwrap_or(Value::Null),
        }
    }

    /// All rows in order, when the shape holds a list.
    pub fn flatten(&self) -> Option<Vec<Value>> {
        match self {
            CacheData::Response { data: Value::Array(rows), .. } => Some(rows.clone()),
            CacheData::Response { .. } => None,
            CacheData::Pages(pages) => Some(pages.iter().flatten().cloned().collect()),
            CacheData::HasMorePages(pages) => Some(pages.iter().flat_map(|page| page.data.iter().cloned()).collect()),
        }
    }

    /// Rebuilds this shape around `rows`, splitting pages by `limit`.
    ///
    /// Every has-more page but the last gets `has_more = true`; the last one
    /// keeps the flag of the previous last page. An array response gets
    /// `count = rows.len()`.
    pub fn rechunk(&self, rows: Vec<Value>, limit: usize) -> Self {
        let limit = limit.max(1);
        match self {
            CacheData::Response { .. } => CacheData::Response { count: Some(rows.len() as i64), data: Value::Array(rows) },
            CacheData::Pages(_) => CacheData::Pages(chunk(rows, limit)),
            CacheData::HasMorePages(previous) => {
                let last_has_more = previous.last().is_some_and(|page| page.has_more);
                let chunks = chunk(rows, limit);
                let total = chunks.len();
                CacheData::HasMorePages(
                    chunks
                        .into_iter()
                        .enumerate()
                        .map(|(idx, data)| HasMorePage { data, has_more: idx + 1 < total || last_has_more })
                        .collect(),
                )
            }
        }
    }
}

fn is_has_more_page(value: &Value) -> bool {
    value.get("data").is_some_and(Value::is_array) && value.get("hasMore").is_some_and(Value::is_boolean)
}

fn chunk(rows: Vec<Value>, limit: usize) -> Vec<Vec<Value>> {
    let mut pages = vec![];
    let mut rows = rows.into_iter().peekable();
    while rows.peek().is_some() {
        pages.push(rows.by_ref().take(limit).collect());
    }
    pages
}

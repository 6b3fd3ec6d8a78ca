use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;

const PAGE_MARKER: &str = "page";
const NULL: &str = "null";

/// Metadata carried by a cache key.
///
/// Keys look like
/// `[page$]postgrest$<schema>$<table>$<query_key>$<body_key|null>$count=<c|null>$head=<bool>$<order_by_key|null>`
/// with the marker and separator taken from [`EngineConfig`]. `select`,
/// `limit` and `offset` are read from the query key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedKey {
    pub schema: String,
    pub table: String,
    pub query_key: String,
    pub select: String,
    pub body_key: Option<String>,
    pub count: Option<String>,
    pub is_head: bool,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub order_by_key: Option<String>,
    pub is_infinite: bool,
}

impl DecodedKey {
    pub fn new(schema: &str, table: &str, query_key: &str) -> Self {
        let (select, limit, offset) = read_query_key(query_key);
        Self {
            schema: schema.to_string(),
            table: table.to_string(),
            query_key: query_key.to_string(),
            select,
            body_key: None,
            count: None,
            is_head: false,
            limit,
            offset,
            order_by_key: None,
            is_infinite: false,
        }
    }

    pub fn with_order_by_key(mut self, order_by_key: &str) -> Self {
        self.order_by_key = Some(order_by_key.to_string());
        self
    }

    pub fn with_count(mut self, count: &str) -> Self {
        self.count = Some(count.to_string());
        self
    }

    pub fn head(mut self) -> Self {
        self.is_head = true;
        self
    }

    pub fn infinite(mut self) -> Self {
        self.is_infinite = true;
        self
    }

    pub fn encode(&self, config: &EngineConfig) -> String {
        let mut parts: Vec<String> = vec![];
        if self.is_infinite {
            parts.push(PAGE_MARKER.to_string());
        }
        parts.push(config.key_prefix.clone());
        parts.push(self.schema.clone());
        parts.push(self.table.clone());
        parts.push(self.query_key.clone());
        parts.push(self.body_key.clone().unwrap_or_else(|| NULL.to_string()));
        parts.push(format!("count={}", self.count.as_deref().unwrap_or(NULL)));
        parts.push(format!("head={}", self.is_head));
        parts.push(self.order_by_key.clone().unwrap_or_else(|| NULL.to_string()));
        parts.join(&config.key_separator)
    }

    /// `None` for keys not managed by this engine.
    pub fn decode(key: &str, config: &EngineConfig) -> Option<Self> {
        let mut parts: Vec<&str> = key.split(config.key_separator.as_str()).collect();

        let is_infinite = parts.first() == Some(&PAGE_MARKER);
        if is_infinite {
            parts.remove(0);
        }
        if parts.len() < 8 || parts[0] != config.key_prefix {
            return None;
        }

        let tail = parts.split_off(parts.len() - 4);
        let count = tail[1].strip_prefix("count=")?;
        let is_head = match tail[2].strip_prefix("head=")? {
            "true" => true,
            "false" => false,
            _ => return None,
        };

        // a separator inside the query key splits it, join it back
        let query_key = parts[3..].join(&config.key_separator);
        let (select, limit, offset) = read_query_key(&query_key);

        Some(Self {
            schema: parts[1].to_string(),
            table: parts[2].to_string(),
            query_key,
            select,
            body_key: non_null(tail[0]),
            count: non_null(count),
            is_head,
            limit,
            offset,
            order_by_key: non_null(tail[3]),
            is_infinite,
        })
    }
}

fn non_null(part: &str) -> Option<String> {
    (part != NULL && !part.is_empty()).then(|| part.to_string())
}

fn read_query_key(query_key: &str) -> (String, Option<usize>, Option<usize>) {
    let mut select = "*".to_string();
    let mut limit = None;
    let mut offset = None;
    for param in query_key.split('&') {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        match key {
            "select" => {
                let value = value.replace('+', " ");
                select = urlencoding::decode(&value).map(|decoded| decoded.into_owned()).unwrap_or_else(|_| value.clone());
            }
            "limit" => limit = value.parse().ok(),
            "offset" => offset = value.parse().ok(),
            _ => {}
        }
    }
    (select, limit, offset)
}

use serde::{Deserialize, Serialize};

/// A single selected leaf of a select clause.
///
/// - `declaration`: the fragment as written, ancestors joined with `.`
///   (`assignee:assignee_id.test_name:display_name`).
/// - `path`: the declaration without aliases, hints kept
///   (`assignee_id.display_name`).
/// - `alias`: dotted chain of effective names, only present when at least
///   one segment carries an explicit alias (`assignee.test_name`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path {
    pub declaration: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl Path {
    pub fn new(declaration: &str, path: &str, alias: Option<&str>) -> Self {
        Self {
            declaration: declaration.to_string(),
            path: path.to_string(),
            alias: alias.map(str::to_string),
        }
    }

    /// Path referenced without any alias, e.g. a filter column.
    pub fn from_path(path: &str) -> Self {
        Self::new(path, path, None)
    }

    /// Same datum, selected without aliases.
    pub fn without_alias(&self) -> Self {
        Self {
            declaration: remove_alias_from_declaration(&self.declaration),
            path: self.path.clone(),
            alias: None,
        }
    }

    pub fn segments(&self) -> Vec<&str> {
        self.path.split('.').collect()
    }

    pub fn terminal(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }

    pub fn is_wildcard(&self) -> bool {
        self.terminal() == "*"
    }

    pub fn is_aggregate(&self) -> bool {
        is_aggregate_name(self.terminal())
    }

    /// Key chain of this value inside a user-shaped row.
    pub fn output_path(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None => strip_hints_from_path(&self.path),
        }
    }
}

pub fn is_aggregate_name(name: &str) -> bool {
    name == "count" || name == "count()"
}

/// Splits `alias:name!hint` into its alias and the rest. A `::` cast marker
/// never counts as an alias separator.
pub fn split_alias(segment: &str) -> (Option<&str>, &str) {
    let bytes = segment.as_bytes();
    for (idx, byte) in bytes.iter().enumerate() {
        if *byte != b':' {
            continue;
        }
        let prev_colon = idx > 0 && bytes[idx - 1] == b':';
        let next_colon = idx + 1 < bytes.len() && bytes[idx + 1] == b':';
        if !prev_colon && !next_colon {
            return (Some(&segment[..idx]), &segment[idx + 1..]);
        }
    }
    (None, segment)
}

/// `employee!created_by!inner` -> `employee`
pub fn strip_hints(segment: &str) -> &str {
    segment.split('!').next().unwrap_or(segment)
}

/// Referenced name of an alias-free segment: hints and casts removed.
pub fn bare_name(segment: &str) -> &str {
    let name = strip_hints(segment);
    name.split("::").next().unwrap_or(name)
}

pub fn strip_hints_from_path(path: &str) -> String {
    path.split('.').map(strip_hints).collect::<Vec<_>>().join(".")
}

pub fn remove_alias_from_declaration(declaration: &str) -> String {
    declaration
        .split('.')
        .map(|segment| split_alias(segment).1)
        .collect::<Vec<_>>()
        .join(".")
}

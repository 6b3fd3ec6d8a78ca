use serde::{Deserialize, Serialize};

use crate::select::Path;

/// A relation expansion and everything selected below it. `declaration`,
/// `path` and `alias` describe this level only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedPath {
    pub declaration: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub paths: Vec<GroupedPath>,
}

/// Emitted select tree. Leaves carry level-relative paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupedPath {
    Nested(NestedPath),
    Leaf(Path),
}

impl GroupedPath {
    pub fn declaration(&self) -> &str {
        match self {
            GroupedPath::Nested(nested) => &nested.declaration,
            GroupedPath::Leaf(leaf) => &leaf.declaration,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            GroupedPath::Nested(nested) => &nested.path,
            GroupedPath::Leaf(leaf) => &leaf.path,
        }
    }

    pub fn alias(&self) -> Option<&str> {
        match self {
            GroupedPath::Nested(nested) => nested.alias.as_deref(),
            GroupedPath::Leaf(leaf) => leaf.alias.as_deref(),
        }
    }

    /// Serializes a level back into select clause text.
    pub fn to_statement(paths: &[GroupedPath]) -> String {
        paths
            .iter()
            .map(|grouped| match grouped {
                GroupedPath::Nested(nested) => {
                    format!("{}({})", nested.declaration, Self::to_statement(&nested.paths))
                }
                GroupedPath::Leaf(leaf) => leaf.declaration.clone(),
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::filter::{RowValues, ValueCompare};
use crate::select::strip_hints_from_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    Ilike,
    Is,
    In,
    Cs,
    Cd,
    Match,
    Imatch,
}

impl TryFrom<&str> for FilterOperator {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "eq" => Ok(FilterOperator::Eq),
            "neq" => Ok(FilterOperator::Neq),
            "gt" => Ok(FilterOperator::Gt),
            "gte" => Ok(FilterOperator::Gte),
            "lt" => Ok(FilterOperator::Lt),
            "lte" => Ok(FilterOperator::Lte),
            "like" => Ok(FilterOperator::Like),
            "ilike" => Ok(FilterOperator::Ilike),
            "is" => Ok(FilterOperator::Is),
            "in" => Ok(FilterOperator::In),
            "cs" => Ok(FilterOperator::Cs),
            "cd" => Ok(FilterOperator::Cd),
            "match" => Ok(FilterOperator::Match),
            "imatch" => Ok(FilterOperator::Imatch),
            _ => Err(format!("Invalid filter operator: '{}'", value)),
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Neq => "neq",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::Like => "like",
            FilterOperator::Ilike => "ilike",
            FilterOperator::Is => "is",
            FilterOperator::In => "in",
            FilterOperator::Cs => "cs",
            FilterOperator::Cd => "cd",
            FilterOperator::Match => "match",
            FilterOperator::Imatch => "imatch",
        };
        f.write_str(name)
    }
}

impl FilterOperator {
    /// `value` is the row value, `target` the filter operand. Null row values
    /// only satisfy `is`.
    pub fn matches(&self, value: &Value, target: &Value) -> bool {
        use std::cmp::Ordering::*;

        if value.is_null() && *self != FilterOperator::Is {
            return false;
        }

        match self {
            FilterOperator::Eq => ValueCompare::equals(value, target),
            FilterOperator::Neq => !ValueCompare::equals(value, target),
            FilterOperator::Gt => ValueCompare::compare(value, target) == Some(Greater),
            FilterOperator::Gte => matches!(ValueCompare::compare(value, target), Some(Greater | Equal)),
            FilterOperator::Lt => ValueCompare::compare(value, target) == Some(Less),
            FilterOperator::Lte => matches!(ValueCompare::compare(value, target), Some(Less | Equal)),
            FilterOperator::Like | FilterOperator::Ilike => match (value, target) {
                (Value::String(text), Value::String(pattern)) => {
                    ValueCompare::like(text, pattern, *self == FilterOperator::Ilike)
                }
                _ => false,
            },
            FilterOperator::Match | FilterOperator::Imatch => match (value, target) {
                (Value::String(text), Value::String(pattern)) => {
                    ValueCompare::regex_match(text, pattern, *self == FilterOperator::Imatch)
                }
                _ => false,
            },
            FilterOperator::Is => match target {
                Value::Bool(flag) => value.as_bool() == Some(*flag),
                _ => value.is_null(),
            },
            FilterOperator::In => target
                .as_array()
                .is_some_and(|items| items.iter().any(|item| ValueCompare::equals(value, item))),
            FilterOperator::Cs => ValueCompare::contains(value, target),
            FilterOperator::Cd => ValueCompare::contains(target, value),
        }
    }
}

/// One predicate of a live query. `path` is canonical; `alias` is the key
/// chain the column has in the query's own rows, when it differs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub operator: FilterOperator,
    #[serde(default)]
    pub negate: bool,
    pub value: Value,
}

impl FilterCondition {
    pub fn new(path: &str, operator: FilterOperator, value: Value) -> Self {
        Self {
            path: path.to_string(),
            alias: None,
            operator,
            negate: false,
            value,
        }
    }

    pub fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    /// Key chain used to read the value out of a user-shaped row.
    pub fn lookup_path(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None => strip_hints_from_path(&self.path),
        }
    }

    pub fn targets(&self, paths: &[String]) -> bool {
        paths.iter().any(|path| *path == self.path || Some(path) == self.alias.as_ref())
    }

    /// A value missing from the row fails the condition, negated or not.
    pub fn matches(&self, row: &Value) -> bool {
        let lookup = self.lookup_path();
        let values = RowValues::resolve(row, &lookup);
        if values.is_empty() {
            return false;
        }

        let found = values.iter().any(|value| self.operator.matches(value, &self.value));
        found != self.negate
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterDefinition {
    Filter(FilterCondition),
    Or(Vec<FilterDefinition>),
    And(Vec<FilterDefinition>),
}

pub type FilterDefinitions = Vec<FilterDefinition>;

/// Path referenced by a filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterPath {
    pub path: String,
    pub alias: Option<String>,
}

impl FilterDefinition {
    pub fn eq(path: &str, value: Value) -> Self {
        FilterDefinition::Filter(FilterCondition::new(path, FilterOperator::Eq, value))
    }

    pub fn matches(&self, row: &Value) -> bool {
        match self {
            FilterDefinition::Filter(condition) => condition.matches(row),
            FilterDefinition::Or(group) => group.is_empty() || group.iter().any(|def| def.matches(row)),
            FilterDefinition::And(group) => group.iter().all(|def| def.matches(row)),
        }
    }

    /// Logical negation, pushed down to the conditions.
    pub fn negate(self) -> Self {
        match self {
            FilterDefinition::Filter(condition) => FilterDefinition::Filter(condition.negated()),
            FilterDefinition::Or(group) => FilterDefinition::And(group.into_iter().map(Self::negate).collect()),
            FilterDefinition::And(group) => FilterDefinition::Or(group.into_iter().map(Self::negate).collect()),
        }
    }

    /// Keeps only conditions on `paths`; groups left empty are dropped.
    pub fn restrict_to_paths(&self, paths: &[String]) -> Option<Self> {
        match self {
            FilterDefinition::Filter(condition) => condition.targets(paths).then(|| self.clone()),
            FilterDefinition::Or(group) => {
                let group: Vec<Self> = group.iter().filter_map(|def| def.restrict_to_paths(paths)).collect();
                (!group.is_empty()).then_some(FilterDefinition::Or(group))
            }
            FilterDefinition::And(group) => {
                let group: Vec<Self> = group.iter().filter_map(|def| def.restrict_to_paths(paths)).collect();
                (!group.is_empty()).then_some(FilterDefinition::And(group))
            }
        }
    }

    fn collect_paths(&self, out: &mut Vec<FilterPath>) {
        match self {
            FilterDefinition::Filter(condition) => {
                let path = FilterPath { path: condition.path.clone(), alias: condition.alias.clone() };
                if !out.contains(&path) {
                    out.push(path);
                }
            }
            FilterDefinition::Or(group) | FilterDefinition::And(group) => {
                for def in group {
                    def.collect_paths(out);
                }
            }
        }
    }
}

/// Unique paths touched by the filters, in first-seen order.
pub fn extract_paths_from_filters(filters: &[FilterDefinition]) -> Vec<FilterPath> {
    let mut out = vec![];
    for def in filters {
        def.collect_paths(&mut out);
    }
    out
}

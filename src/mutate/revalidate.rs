use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cache::DecodedKey;
use crate::config::EngineConfig;
use crate::filter::RowFilter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevalidateTable {
    #[serde(default)]
    pub schema: Option<String>,
    pub table: String,
}

/// Revalidate queries on `relation` whose `relation_id_column` filter
/// accepts the value the mutated row holds in `fkey_column`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevalidateRelation {
    #[serde(default)]
    pub schema: Option<String>,
    pub relation: String,
    pub relation_id_column: String,
    pub fkey_column: String,
}

/// Extra keys to revalidate on a mutation, on top of the patched ones.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RevalidateOpts {
    #[serde(default)]
    pub tables: Vec<RevalidateTable>,
    #[serde(default)]
    pub relations: Vec<RevalidateRelation>,
}

impl RevalidateOpts {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.relations.is_empty()
    }

    pub fn table(mut self, schema: Option<&str>, table: &str) -> Self {
        self.tables.push(RevalidateTable { schema: schema.map(str::to_string), table: table.to_string() });
        self
    }

    pub fn relation(mut self, schema: Option<&str>, relation: &str, relation_id_column: &str, fkey_column: &str) -> Self {
        self.relations.push(RevalidateRelation {
            schema: schema.map(str::to_string),
            relation: relation.to_string(),
            relation_id_column: relation_id_column.to_string(),
            fkey_column: fkey_column.to_string(),
        });
        self
    }

    pub fn should_revalidate_table(&self, key: &DecodedKey, config: &EngineConfig) -> bool {
        self.tables
            .iter()
            .any(|rule| rule.table == key.table && same_schema(rule.schema.as_deref(), key, config))
    }

    /// `filter` is the key's own row filter; without one every key on the
    /// relation matches.
    pub fn should_revalidate_relation(
        &self,
        input: &Value,
        key: &DecodedKey,
        filter: Option<&dyn RowFilter>,
        config: &EngineConfig,
    ) -> bool {
        self.relations.iter().any(|rule| {
            if rule.relation != key.table || !same_schema(rule.schema.as_deref(), key, config) {
                return false;
            }
            let Some(fkey) = input.get(&rule.fkey_column).filter(|value| !value.is_null()) else {
                return false;
            };
            let Some(filter) = filter else {
                return true;
            };

            let mut row = Map::new();
            row.insert(rule.relation_id_column.clone(), fkey.clone());
            filter.apply_filters_on_paths(&Value::Object(row), std::slice::from_ref(&rule.relation_id_column))
        })
    }
}

fn same_schema(schema: Option<&str>, key: &DecodedKey, config: &EngineConfig) -> bool {
    schema.unwrap_or(&config.default_schema) == key.schema
}

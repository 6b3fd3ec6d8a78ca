use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::filter::{RowValues, ValueCompare};
use crate::select::ParseError;

static NULL: Value = Value::Null;

/// One sort key; the first definition of a list is the primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDefinition {
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_table: Option<String>,
    pub ascending: bool,
    pub nulls_first: bool,
}

impl OrderDefinition {
    pub fn asc(column: &str) -> Self {
        Self { column: column.to_string(), foreign_table: None, ascending: true, nulls_first: false }
    }

    pub fn desc(column: &str) -> Self {
        Self { column: column.to_string(), foreign_table: None, ascending: false, nulls_first: true }
    }

    fn value<'a>(&self, row: &'a Value) -> &'a Value {
        let path = match &self.foreign_table {
            Some(table) => format!("{}.{}", table, self.column),
            None => self.column.clone(),
        };
        RowValues::resolve(row, &path).into_iter().next().unwrap_or(&NULL)
    }

    /// Compares two rows over a list of definitions, later keys break ties.
    pub fn compare_rows(order_by: &[OrderDefinition], a: &Value, b: &Value) -> Ordering {
        for def in order_by {
            let ord = ValueCompare::cmp_for_sort(def.value(a), def.value(b), def.ascending, def.nulls_first);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

/// Parses an order-by cache key segment:
/// `column:asc.nullsFirst|foreign_table.column:desc.nullsLast`.
pub fn parse_order_by_key(key: &str) -> Result<Vec<OrderDefinition>, ParseError> {
    let mut definitions = vec![];
    let mut offset = 0;
    for item in key.split('|') {
        let Some((table_def, order_def)) = item.split_once(':') else {
            return ParseError::in_text("Invalid order by key", item, offset).err();
        };
        let (foreign_table, column) = match table_def.split_once('.') {
            Some((table, column)) => (Some(table.to_string()), column.to_string()),
            None => (None, table_def.to_string()),
        };
        let (direction, nulls) = order_def.split_once('.').unwrap_or((order_def, "nullsLast"));

        let ascending = match direction {
            "asc" => true,
            "desc" => false,
            _ => return ParseError::in_text("Invalid order direction", item, offset).err(),
        };
        let nulls_first = match nulls {
            "nullsFirst" => true,
            "nullsLast" => false,
            _ => return ParseError::in_text("Invalid null placement", item, offset).err(),
        };
        if column.is_empty() {
            return ParseError::in_text("Missing order column", item, offset).err();
        }

        definitions.push(OrderDefinition { column, foreign_table, ascending, nulls_first });
        offset += item.chars().count() + 1;
    }
    Ok(definitions)
}

/// Parses a PostgREST `order` parameter: `status.asc.nullslast,id.desc`.
/// Without an explicit placement nulls sort last ascending and first
/// descending.
pub fn parse_order_param(param: &str) -> Result<Vec<OrderDefinition>, ParseError> {
    let mut definitions = vec![];
    let mut offset = 0;
    for item in param.split(',') {
        let mut tokens: Vec<&str> = item.trim().split('.').collect();
        let mut ascending = true;
        let mut nulls: Option<bool> = None;

        while tokens.len() > 1 {
            match tokens[tokens.len() - 1] {
                "asc" => ascending = true,
                "desc" => ascending = false,
                "nullsfirst" => nulls = Some(true),
                "nullslast" => nulls = Some(false),
                _ => break,
            }
            tokens.pop();
        }

        let column = tokens.join(".");
        if column.is_empty() {
            return ParseError::in_text("Missing order column", item, offset).err();
        }

        definitions.push(OrderDefinition {
            column,
            foreign_table: None,
            ascending,
            nulls_first: nulls.unwrap_or(!ascending),
        });
        offset += item.chars().count() + 1;
    }
    Ok(definitions)
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use serde_json::json;

    use crate::filter::{parse_order_by_key, parse_order_param, OrderDefinition};

    #[test]
    pub fn test_parse_order_by_key() {
        let result = parse_order_by_key("created_at:desc.nullsFirst|author.name:asc.nullsLast")
            .expect("Failed to parse order by key");

        assert_eq!(result, vec![
            OrderDefinition { column: "created_at".into(), foreign_table: None, ascending: false, nulls_first: true },
            OrderDefinition {
                column: "name".into(),
                foreign_table: Some("author".into()),
                ascending: true,
                nulls_first: false,
            },
        ]);
    }

    #[test]
    pub fn test_parse_order_by_key_errors() {
        let err = parse_order_by_key("id:asc|name").expect_err("Missing direction must fail");
        assert_eq!(err.start, 7);
        assert!(parse_order_by_key("id:up.nullsLast").is_err());
    }

    #[test]
    pub fn test_parse_order_param() {
        let result = parse_order_param("status.asc.nullsfirst,id.desc,name").expect("Failed to parse order");

        assert_eq!(result, vec![
            OrderDefinition { column: "status".into(), foreign_table: None, ascending: true, nulls_first: true },
            OrderDefinition::desc("id"),
            OrderDefinition::asc("name"),
        ]);
    }

    #[test]
    pub fn test_compare_rows_tie_break() {
        let order_by = vec![OrderDefinition::asc("status"), OrderDefinition::desc("id")];
        let a = json!({ "status": "open", "id": 1 });
        let b = json!({ "status": "open", "id": 2 });
        let c = json!({ "status": null, "id": 3 });

        assert_eq!(OrderDefinition::compare_rows(&order_by, &a, &b), Ordering::Greater);
        assert_eq!(OrderDefinition::compare_rows(&order_by, &c, &a), Ordering::Greater);
    }
}

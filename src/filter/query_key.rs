use serde_json::Value;
use tracing::trace;

use crate::filter::{
    FilterCondition, FilterDefinition, FilterDefinitions, FilterOperator, OrderDefinition, ValueCompare,
    parse_order_param,
};
use crate::select::{ParseError, Path, parse_select};

/// A PostgREST query string split into the parts the cache cares about.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedQuery {
    pub select: String,
    pub paths: Vec<Path>,
    pub filters: FilterDefinitions,
    pub order_by: Vec<OrderDefinition>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
enum Logic {
    Or,
    And,
}

impl Logic {
    fn wrap(self, group: Vec<FilterDefinition>) -> FilterDefinition {
        match self {
            Logic::Or => FilterDefinition::Or(group),
            Logic::And => FilterDefinition::And(group),
        }
    }
}

struct QueryParam {
    key: String,
    value: String,
    offset: usize,
}

const RESERVED_PARAMS: [&str; 2] = ["columns", "on_conflict"];
const EMBEDDED_MODIFIERS: [&str; 3] = [".limit", ".offset", ".order"];

impl ParsedQuery {
    pub fn parse(query_key: &str) -> Result<Self, ParseError> {
        let params = split_params(query_key)?;
        let select = params
            .iter()
            .find(|param| param.key == "select")
            .map(|param| param.value.clone())
            .unwrap_or_else(|| "*".to_string());
        let paths = parse_select(&select)?;

        let mut parsed = ParsedQuery { select, paths, ..Default::default() };
        for param in &params {
            let value_offset = param.offset + param.key.len() + 1;
            match param.key.as_str() {
                "select" => {}
                "order" => parsed.order_by = parse_order_param(&param.value)?,
                "limit" => parsed.limit = Some(parse_count(param)?),
                "offset" => parsed.offset = Some(parse_count(param)?),
                key if RESERVED_PARAMS.contains(&key) => {}
                key if EMBEDDED_MODIFIERS.iter().any(|suffix| key.ends_with(suffix)) => {
                    trace!(key, "Skipping embedded resource modifier");
                }
                key => {
                    let definition = match logic_group(key) {
                        Some((prefix, negate, logic)) => {
                            let group = parse_group(logic, &param.value, prefix, value_offset)?;
                            if negate { group.negate() } else { group }
                        }
                        None => parse_condition(key, &param.value, None, value_offset)?,
                    };
                    let resolved = parsed.resolve_aliases(definition);
                    parsed.filters.push(resolved);
                }
            }
        }

        Ok(parsed)
    }

    /// Rewrites filter columns written against select aliases to canonical
    /// paths, keeping the alias chain for reading user-shaped rows.
    fn resolve_aliases(&self, definition: FilterDefinition) -> FilterDefinition {
        match definition {
            FilterDefinition::Filter(condition) => FilterDefinition::Filter(self.resolve_condition(condition)),
            FilterDefinition::Or(group) => {
                FilterDefinition::Or(group.into_iter().map(|def| self.resolve_aliases(def)).collect())
            }
            FilterDefinition::And(group) => {
                FilterDefinition::And(group.into_iter().map(|def| self.resolve_aliases(def)).collect())
            }
        }
    }

    fn resolve_condition(&self, mut condition: FilterCondition) -> FilterCondition {
        let column = condition.path.clone();

        if let Some(path) = self.paths.iter().find(|p| p.alias.as_deref() == Some(column.as_str())) {
            condition.path = path.path.clone();
            condition.alias = path.alias.clone();
        } else if let Some(path) = self.paths.iter().find(|p| p.path == column || p.output_path() == column) {
            condition.path = path.path.clone();
            condition.alias = path.alias.clone();
        } else if let Some(path) = self.map_alias_prefix(&column) {
            condition.path = path;
            condition.alias = Some(column);
        }

        condition
    }

    /// `author.id` with `author:author_id(name)` selected maps to
    /// `author_id.id`: the longest aliased prefix is swapped for its path.
    fn map_alias_prefix(&self, column: &str) -> Option<String> {
        let column_segments: Vec<&str> = column.split('.').collect();
        for path in &self.paths {
            let Some(alias) = &path.alias else {
                continue;
            };
            let alias_segments: Vec<&str> = alias.split('.').collect();
            let path_segments = path.segments();

            let max = (column_segments.len() - 1).min(alias_segments.len()).min(path_segments.len());
            for k in (1..=max).rev() {
                if column_segments[..k] == alias_segments[..k] {
                    let mapped = path_segments[..k]
                        .iter()
                        .chain(column_segments[k..].iter())
                        .copied()
                        .collect::<Vec<&str>>()
                        .join(".");
                    if mapped != column {
                        return Some(mapped);
                    }
                }
            }
        }
        None
    }
}

pub fn parse_query_key(query_key: &str) -> Result<ParsedQuery, ParseError> {
    ParsedQuery::parse(query_key)
}

fn split_params(query_key: &str) -> Result<Vec<QueryParam>, ParseError> {
    let mut params = vec![];
    let mut offset = 0;
    for raw in query_key.split('&') {
        if !raw.is_empty() {
            let (key, value) = raw.split_once('=').unwrap_or((raw, ""));
            params.push(QueryParam {
                key: decode(key, raw, offset)?,
                value: decode(value, raw, offset)?,
                offset,
            });
        }
        offset += raw.len() + 1;
    }
    Ok(params)
}

/// Form-encoded keys write spaces as `+`; a literal plus arrives as `%2B`.
fn decode(text: &str, raw: &str, offset: usize) -> Result<String, ParseError> {
    urlencoding::decode(&text.replace('+', " "))
        .map(|decoded| decoded.into_owned())
        .map_err(|_| ParseError::in_text("Invalid percent-encoding", raw, offset))
}

fn parse_count(param: &QueryParam) -> Result<usize, ParseError> {
    param
        .value
        .trim()
        .parse::<usize>()
        .map_err(|_| ParseError::in_text(&format!("Invalid {}", param.key), &param.value, param.offset))
}

/// `or`, `and`, `not.or`, `rel.or`, `rel.not.and`, ...
fn logic_group(key: &str) -> Option<(Option<&str>, bool, Logic)> {
    let (rest, logic) = match key {
        "or" => ("", Logic::Or),
        "and" => ("", Logic::And),
        _ => {
            if let Some(rest) = key.strip_suffix(".or") {
                (rest, Logic::Or)
            } else if let Some(rest) = key.strip_suffix(".and") {
                (rest, Logic::And)
            } else {
                return None;
            }
        }
    };

    let (prefix, negate) = if rest == "not" {
        ("", true)
    } else if let Some(prefix) = rest.strip_suffix(".not") {
        (prefix, true)
    } else {
        (rest, false)
    };

    Some(((!prefix.is_empty()).then_some(prefix), negate, logic))
}

fn parse_group(logic: Logic, body: &str, prefix: Option<&str>, offset: usize) -> Result<FilterDefinition, ParseError> {
    let Some(inner) = body.trim().strip_prefix('(').and_then(|inner| inner.strip_suffix(')')) else {
        return ParseError::in_text("Expected a parenthesized filter group", body, offset).err();
    };

    let mut group = vec![];
    for (position, item) in split_top_level(inner, offset + 1)? {
        let item = item.trim();
        if item.is_empty() {
            return ParseError::in_text("Empty filter", inner, offset + 1 + position).err();
        }
        group.push(parse_group_item(item, prefix, offset + 1 + position)?);
    }
    Ok(logic.wrap(group))
}

fn parse_group_item(item: &str, prefix: Option<&str>, offset: usize) -> Result<FilterDefinition, ParseError> {
    let (negate, body) = match item.strip_prefix("not.") {
        Some(rest) if rest.starts_with("or(") || rest.starts_with("and(") => (true, rest),
        _ => (false, item),
    };

    for (name, logic) in [("or", Logic::Or), ("and", Logic::And)] {
        if let Some(rest) = body.strip_prefix(name) {
            if rest.starts_with('(') {
                let group = parse_group(logic, rest, prefix, offset + item.len() - rest.len())?;
                return Ok(if negate { group.negate() } else { group });
            }
        }
    }

    let segments: Vec<&str> = item.split('.').collect();
    let operator_at = (1..segments.len()).find(|&i| {
        is_operator(segments[i]) || (segments[i] == "not" && segments.get(i + 1).is_some_and(|s| is_operator(s)))
    });
    let Some(operator_at) = operator_at else {
        return ParseError::in_text("Missing filter operator", item, offset).err();
    };

    let column = segments[..operator_at].join(".");
    let expression = segments[operator_at..].join(".");
    parse_condition(&column, &expression, prefix, offset)
}

fn is_operator(token: &str) -> bool {
    FilterOperator::try_from(token).is_ok()
}

/// `column` + `[not.]op.value`.
fn parse_condition(
    column: &str,
    expression: &str,
    prefix: Option<&str>,
    offset: usize,
) -> Result<FilterDefinition, ParseError> {
    let (negate, expression) = match expression.strip_prefix("not.") {
        Some(rest) => (true, rest),
        None => (false, expression),
    };
    let Some((operator, operand)) = expression.split_once('.') else {
        return ParseError::in_text("Missing filter value", expression, offset).err();
    };

    let operator = FilterOperator::try_from(operator).map_err(|message| ParseError::in_text(&message, expression, offset))?;
    let value = parse_operand(operator, operand, offset)?;
    let path = match prefix {
        Some(prefix) => format!("{}.{}", prefix, column),
        None => column.to_string(),
    };

    let condition = FilterCondition::new(&path, operator, value);
    Ok(FilterDefinition::Filter(if negate { condition.negated() } else { condition }))
}

fn parse_operand(operator: FilterOperator, operand: &str, offset: usize) -> Result<Value, ParseError> {
    match operator {
        FilterOperator::In => {
            let Some(inner) = operand.strip_prefix('(').and_then(|inner| inner.strip_suffix(')')) else {
                return ParseError::in_text("Expected a parenthesized list", operand, offset).err();
            };
            Ok(Value::Array(parse_list_items(inner, offset)?))
        }
        FilterOperator::Cs | FilterOperator::Cd => {
            if let Ok(json) = serde_json::from_str::<Value>(operand) {
                return Ok(json);
            }
            match operand.strip_prefix('{').and_then(|inner| inner.strip_suffix('}')) {
                Some(inner) => Ok(Value::Array(parse_list_items(inner, offset)?)),
                None => ParseError::in_text("Invalid containment operand", operand, offset).err(),
            }
        }
        FilterOperator::Is => match operand.to_lowercase().as_str() {
            "null" | "unknown" => Ok(Value::Null),
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => ParseError::in_text("Invalid operand for is", operand, offset).err(),
        },
        FilterOperator::Like | FilterOperator::Ilike | FilterOperator::Match | FilterOperator::Imatch => {
            Ok(Value::String(operand.to_string()))
        }
        _ => Ok(ValueCompare::parse_value(operand)),
    }
}

fn parse_list_items(inner: &str, offset: usize) -> Result<Vec<Value>, ParseError> {
    Ok(split_top_level(inner, offset)?
        .into_iter()
        .map(|(_, item)| item.trim())
        .filter(|item| !item.is_empty())
        .map(ValueCompare::parse_value)
        .collect())
}

/// Splits on commas outside brackets and double quotes, keeping each item's
/// byte position.
fn split_top_level(text: &str, offset: usize) -> Result<Vec<(usize, &str)>, ParseError> {
    let mut items = vec![];
    let mut depth = 0usize;
    let mut quoted = false;
    let mut start = 0;

    for (index, ch) in text.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            '(' | '{' | '[' if !quoted => depth += 1,
            ')' | '}' | ']' if !quoted => {
                if depth == 0 {
                    return ParseError::in_text("Unbalanced parentheses", text, offset + index).err();
                }
                depth -= 1;
            }
            ',' if !quoted && depth == 0 => {
                items.push((start, &text[start..index]));
                start = index + 1;
            }
            _ => {}
        }
    }

    if depth > 0 || quoted {
        return ParseError::in_text("Missing closing parenthesis", text, offset).err();
    }
    items.push((start, &text[start..]));
    Ok(items)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::filter::{
        FilterCondition, FilterDefinition, FilterOperator, OrderDefinition, ParsedQuery, parse_query_key,
    };

    fn condition(path: &str, operator: FilterOperator, value: serde_json::Value) -> FilterDefinition {
        FilterDefinition::Filter(FilterCondition::new(path, operator, value))
    }

    #[test]
    pub fn test_parse_query_key_basic() {
        let parsed = parse_query_key("select=id,status&status=eq.open&order=id.desc&limit=10&offset=20")
            .expect("Failed to parse query key");

        assert_eq!(parsed.select, "id,status");
        assert_eq!(parsed.paths.len(), 2);
        assert_eq!(parsed.filters, vec![condition("status", FilterOperator::Eq, json!("open"))]);
        assert_eq!(parsed.order_by, vec![OrderDefinition::desc("id")]);
        assert_eq!(parsed.limit, Some(10));
        assert_eq!(parsed.offset, Some(20));
    }

    #[test]
    pub fn test_parse_query_key_defaults_to_wildcard() {
        let parsed = parse_query_key("status=not.eq.closed").expect("Failed to parse query key");

        assert_eq!(parsed.select, "*");
        assert!(parsed.paths[0].is_wildcard());
        assert_eq!(parsed.filters, vec![FilterDefinition::Filter(
            FilterCondition::new("status", FilterOperator::Eq, json!("closed")).negated()
        )]);
    }

    #[test]
    pub fn test_parse_query_key_groups() {
        let parsed = parse_query_key("select=id,name&or=(id.eq.1,and(name.ilike.*ali*,id.gt.5))&not.and=(id.lt.0,name.is.null)")
            .expect("Failed to parse query key");

        assert_eq!(parsed.filters, vec![
            FilterDefinition::Or(vec![
                condition("id", FilterOperator::Eq, json!(1)),
                FilterDefinition::And(vec![
                    condition("name", FilterOperator::Ilike, json!("*ali*")),
                    condition("id", FilterOperator::Gt, json!(5)),
                ]),
            ]),
            FilterDefinition::Or(vec![
                FilterDefinition::Filter(FilterCondition::new("id", FilterOperator::Lt, json!(0)).negated()),
                FilterDefinition::Filter(FilterCondition::new("name", FilterOperator::Is, json!(null)).negated()),
            ]),
        ]);
    }

    #[test]
    pub fn test_parse_query_key_list_operands() {
        let parsed = parse_query_key("select=id,tags&id=in.(1,2,3)&tags=cs.{a,b}&or=(tags.cd.{\"x,y\"},id.in.(4,5))")
            .expect("Failed to parse query key");

        assert_eq!(parsed.filters, vec![
            condition("id", FilterOperator::In, json!([1, 2, 3])),
            condition("tags", FilterOperator::Cs, json!(["a", "b"])),
            FilterDefinition::Or(vec![
                condition("tags", FilterOperator::Cd, json!(["x,y"])),
                condition("id", FilterOperator::In, json!([4, 5])),
            ]),
        ]);
    }

    #[test]
    pub fn test_parse_query_key_resolves_aliases() {
        let parsed = parse_query_key("select=id,author:author_id(name)&author.name=eq.Alice&author.id=eq.3")
            .expect("Failed to parse query key");

        assert_eq!(parsed.filters, vec![
            FilterDefinition::Filter(
                FilterCondition::new("author_id.name", FilterOperator::Eq, json!("Alice")).with_alias("author.name")
            ),
            FilterDefinition::Filter(
                FilterCondition::new("author_id.id", FilterOperator::Eq, json!(3)).with_alias("author.id")
            ),
        ]);
    }

    #[test]
    pub fn test_parse_query_key_embedded_group_and_modifiers() {
        let parsed = parse_query_key("select=id,tags:tag(name)&tag.or=(name.eq.a,name.eq.b)&tag.limit=5&tag.order=name.asc")
            .expect("Failed to parse query key");

        assert_eq!(parsed.filters, vec![FilterDefinition::Or(vec![
            FilterDefinition::Filter(FilterCondition::new("tag.name", FilterOperator::Eq, json!("a")).with_alias("tags.name")),
            FilterDefinition::Filter(FilterCondition::new("tag.name", FilterOperator::Eq, json!("b")).with_alias("tags.name")),
        ])]);
        assert!(parsed.order_by.is_empty());
    }

    #[test]
    pub fn test_parse_query_key_percent_decoding() {
        let parsed = parse_query_key("select=id%2Cname&name=eq.a%20b").expect("Failed to parse query key");

        assert_eq!(parsed.select, "id,name");
        assert_eq!(parsed.filters, vec![condition("name", FilterOperator::Eq, json!("a b"))]);
    }

    #[test]
    pub fn test_parse_query_key_form_encoded_spaces() {
        let parsed = parse_query_key("select=id,name&name=eq.Ann+Lee&or=(name.eq.a%2Bb,name.eq.c)")
            .expect("Failed to parse query key");

        assert_eq!(parsed.filters, vec![
            condition("name", FilterOperator::Eq, json!("Ann Lee")),
            FilterDefinition::Or(vec![
                condition("name", FilterOperator::Eq, json!("a+b")),
                condition("name", FilterOperator::Eq, json!("c")),
            ]),
        ]);
    }

    #[test]
    pub fn test_parse_query_key_errors() {
        let err = ParsedQuery::parse("select=id&id=foo.1").expect_err("Unknown operator must fail");
        assert!(err.message.contains("Invalid filter operator"));

        assert!(parse_query_key("select=id&or=(id.eq.1").is_err());
        assert!(parse_query_key("select=id&or=(id.eq.1,id)").is_err());
        assert!(parse_query_key("select=id&limit=ten").is_err());
        assert!(parse_query_key("select=id,(").is_err());
    }
}

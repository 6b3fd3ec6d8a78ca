use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use ordered_float::OrderedFloat;
use regex::{Regex, RegexBuilder};
use serde_json::{Number, Value};

static NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?(0|[1-9][0-9]*)(\.[0-9]+)?([eE][+-]?[0-9]+)?$").expect("number pattern is valid")
});

/// Comparison rules shared by filter evaluation and ordering.
pub struct ValueCompare;

impl ValueCompare {
    #[inline]
    fn float_eq(a: f64, b: f64) -> bool {
        let diff = (a - b).abs();
        let eps = 1e-9_f64.max(1e-9_f64 * a.abs()).max(1e-9_f64 * b.abs());
        diff <= eps
    }

    /// Types a textual filter value: numbers, booleans and null, else string.
    /// Double quotes around a value force a string.
    pub fn parse_value(text: &str) -> Value {
        let text = text.trim();
        if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
            return Value::String(text[1..text.len() - 1].to_string());
        }

        match text {
            "null" => return Value::Null,
            "true" => return Value::Bool(true),
            "false" => return Value::Bool(false),
            _ => {}
        }

        if NUMBER.is_match(text) {
            if let Ok(int) = text.parse::<i64>() {
                return Value::Number(Number::from(int));
            }
            if let Some(number) = text.parse::<f64>().ok().and_then(Number::from_f64) {
                return Value::Number(number);
            }
        }

        Value::String(text.to_string())
    }

    fn as_f64(value: &Value) -> Option<f64> {
        match value {
            Value::Number(number) => number.as_f64(),
            Value::String(text) if NUMBER.is_match(text) => text.parse::<f64>().ok(),
            _ => None,
        }
    }

    fn as_timestamp(text: &str) -> Option<NaiveDateTime> {
        if let Ok(date_time) = DateTime::parse_from_rfc3339(text) {
            return Some(date_time.naive_utc());
        }
        if let Ok(date_time) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(date_time);
        }
        if let Ok(date_time) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f") {
            return Some(date_time);
        }
        NaiveDate::parse_from_str(text, "%Y-%m-%d").ok().and_then(|date| date.and_hms_opt(0, 0, 0))
    }

    pub fn equals(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Number(_), Value::Number(_))
            | (Value::Number(_), Value::String(_))
            | (Value::String(_), Value::Number(_)) => match (Self::as_f64(a), Self::as_f64(b)) {
                (Some(x), Some(y)) => Self::float_eq(x, y),
                _ => false,
            },
            (Value::String(x), Value::String(y)) => {
                x == y
                    || matches!(
                        (Self::as_timestamp(x), Self::as_timestamp(y)),
                        (Some(tx), Some(ty)) if tx == ty
                    )
            }
            (Value::Bool(x), Value::String(y)) | (Value::String(y), Value::Bool(x)) => {
                y.as_str() == if *x { "true" } else { "false" }
            }
            _ => a == b,
        }
    }

    /// Ordering between two comparable values, `None` when the pair has no
    /// meaningful order (nulls, mixed types).
    pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
            (Value::String(x), Value::String(y)) => match (Self::as_timestamp(x), Self::as_timestamp(y)) {
                (Some(tx), Some(ty)) => Some(tx.cmp(&ty)),
                _ => Some(x.cmp(y)),
            },
            _ => match (Self::as_f64(a), Self::as_f64(b)) {
                (Some(x), Some(y)) => Some(OrderedFloat(x).cmp(&OrderedFloat(y))),
                _ => None,
            },
        }
    }

    /// Total order for sorting rows, with explicit null placement.
    pub fn cmp_for_sort(a: &Value, b: &Value, ascending: bool, nulls_first: bool) -> Ordering {
        match (a.is_null(), b.is_null()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return if nulls_first { Ordering::Less } else { Ordering::Greater },
            (false, true) => return if nulls_first { Ordering::Greater } else { Ordering::Less },
            _ => {}
        }

        let ord = match Self::compare(a, b) {
            Some(ord) => ord,
            None => match (a, b) {
                (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
                    a.to_string().cmp(&b.to_string())
                }
                _ => Self::type_rank(a).cmp(&Self::type_rank(b)),
            },
        };

        if ascending { ord } else { ord.reverse() }
    }

    fn type_rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0, Value::Bool(_) => 1, Value::Number(_) => 2, Value::String(_) => 3,
            Value::Array(_) => 4, Value::Object(_) => 5
        }
    }

    /// LIKE matching. Both `%` and `*` are wildcards, `_` matches one char.
    pub fn like(value: &str, pattern: &str, case_insensitive: bool) -> bool {
        let mut regex = String::from("^");
        for ch in pattern.chars() {
            match ch {
                '%' | '*' => regex.push_str(".*"),
                '_' => regex.push('.'),
                c => regex.push_str(&regex::escape(&c.to_string())),
            }
        }
        regex.push('$');
        Self::regex_match(value, &regex, case_insensitive)
    }

    pub fn regex_match(value: &str, pattern: &str, case_insensitive: bool) -> bool {
        RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
            .map(|re| re.is_match(value))
            .unwrap_or(false)
    }

    /// `container` holds every element (arrays) or every entry (objects) of
    /// `contained`.
    pub fn contains(container: &Value, contained: &Value) -> bool {
        match (container, contained) {
            (Value::Array(items), Value::Array(needles)) => {
                needles.iter().all(|needle| items.iter().any(|item| Self::equals(item, needle)))
            }
            (Value::Object(map), Value::Object(needles)) => needles
                .iter()
                .all(|(key, needle)| map.get(key).is_some_and(|value| Self::equals(value, needle))),
            (Value::String(text), Value::String(needle)) => text.contains(needle.as_str()),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering::*;

    use serde_json::{json, Value};

    use crate::filter::ValueCompare;

    #[test]
    pub fn test_parse_value() {
        assert_eq!(ValueCompare::parse_value("12"), json!(12));
        assert_eq!(ValueCompare::parse_value("-1.5"), json!(-1.5));
        assert_eq!(ValueCompare::parse_value("true"), json!(true));
        assert_eq!(ValueCompare::parse_value("null"), Value::Null);
        assert_eq!(ValueCompare::parse_value("007"), json!("007"));
        assert_eq!(ValueCompare::parse_value("\"42\""), json!("42"));
        assert_eq!(ValueCompare::parse_value("open"), json!("open"));
    }

    #[test]
    pub fn test_equals_coerces_numbers_and_timestamps() {
        assert!(ValueCompare::equals(&json!(1), &json!(1.0)));
        assert!(ValueCompare::equals(&json!("3"), &json!(3)));
        assert!(ValueCompare::equals(&json!(true), &json!("true")));
        assert!(ValueCompare::equals(
            &json!("2024-01-01T10:00:00+00:00"),
            &json!("2024-01-01T10:00:00Z")
        ));
        assert!(!ValueCompare::equals(&json!("a"), &json!("b")));
    }

    #[test]
    pub fn test_compare() {
        assert_eq!(ValueCompare::compare(&json!(2), &json!(10)), Some(Less));
        assert_eq!(ValueCompare::compare(&json!("b"), &json!("a")), Some(Greater));
        assert_eq!(
            ValueCompare::compare(&json!("2024-01-02"), &json!("2024-01-01T23:00:00Z")),
            Some(Greater)
        );
        assert_eq!(ValueCompare::compare(&json!(null), &json!(1)), None);
    }

    #[test]
    pub fn test_cmp_for_sort_null_placement() {
        assert_eq!(ValueCompare::cmp_for_sort(&Value::Null, &json!(1), true, false), Greater);
        assert_eq!(ValueCompare::cmp_for_sort(&Value::Null, &json!(1), true, true), Less);
        assert_eq!(ValueCompare::cmp_for_sort(&Value::Null, &json!(1), false, true), Less);
        assert_eq!(ValueCompare::cmp_for_sort(&json!(1), &json!(2), false, false), Greater);
        assert_eq!(ValueCompare::cmp_for_sort(&json!(true), &json!("x"), true, false), Less);
    }

    #[test]
    pub fn test_like() {
        assert!(ValueCompare::like("hello world", "hello%", false));
        assert!(ValueCompare::like("hello world", "*world", false));
        assert!(ValueCompare::like("HeLLo", "hello", true));
        assert!(!ValueCompare::like("HeLLo", "hello", false));
        assert!(ValueCompare::like("a.c", "a.c", false));
        assert!(!ValueCompare::like("abc", "a.c", false));
    }

    #[test]
    pub fn test_contains() {
        assert!(ValueCompare::contains(&json!(["a", "b", "c"]), &json!(["a", "c"])));
        assert!(!ValueCompare::contains(&json!(["a"]), &json!(["a", "c"])));
        assert!(ValueCompare::contains(&json!({"a": 1, "b": 2}), &json!({"a": 1})));
    }
}

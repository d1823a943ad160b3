// SPDX-License-Identifier: MIT

//! Runtime values seen by the evaluator

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// Dynamically typed operand
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    String(String),
    Boolean(bool),
    /// Date-shaped string literal: the parsed instant and the quoted text.
    /// Numeric operators use the instant, everything else sees the text.
    Time(DateTime<Utc>, String),
    Sequence(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// A field that exists but holds `null`
    Missing,
}

impl Value {
    /// Name of the value's type, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Time(..) => "time",
            Value::Sequence(_) => "sequence",
            Value::Map(_) => "map",
            Value::Missing => "missing",
        }
    }

    /// Coerce to a finite float for numeric operators.
    ///
    /// Numeric strings parse as numbers, times and date-shaped strings become
    /// epoch seconds.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .or_else(|| parse_time(s.trim()).map(|t| epoch_seconds(&t))),
            Value::Time(t, _) => Some(epoch_seconds(t)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Text of strings and time literals
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Time(_, s) => Some(s),
            _ => None,
        }
    }

    /// Value equality across types: mismatched types are unequal
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => (a - b).abs() < f64::EPSILON,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Sequence(a), Value::Sequence(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loosely_equals(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|other| v.loosely_equals(other)))
            }
            (Value::Missing, Value::Missing) => true,
            _ => match (self.as_str(), other.as_str()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

fn epoch_seconds(t: &DateTime<Utc>) -> f64 {
    t.timestamp() as f64 + f64::from(t.timestamp_subsec_nanos()) / 1e9
}

/// Parse text shaped like an RFC 3339 timestamp or a `YYYY-MM-DD` date
pub fn parse_time(text: &str) -> Option<DateTime<Utc>> {
    if !text.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

impl From<&JsonValue> for Value {
    fn from(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Missing,
            JsonValue::Bool(b) => Value::Boolean(*b),
            JsonValue::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Missing),
            JsonValue::String(s) => Value::String(s.clone()),
            JsonValue::Array(items) => Value::Sequence(items.iter().map(Value::from).collect()),
            JsonValue::Object(obj) => Value::Map(
                obj.iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        Value::from(&json)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Time(_, text) => write!(f, "{}", text),
            Value::Sequence(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Map(map) => {
                let parts: Vec<String> = map.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::Missing => write!(f, "null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_from_json() {
        assert_eq!(Value::from(json!(4)), Value::Number(4.0));
        assert_eq!(Value::from(json!("x")), Value::String("x".to_string()));
        assert_eq!(Value::from(json!(null)), Value::Missing);
        assert_eq!(
            Value::from(json!(["a", true])),
            Value::Sequence(vec![Value::from("a"), Value::Boolean(true)])
        );
        match Value::from(json!({"city": "Paris"})) {
            Value::Map(map) => assert_eq!(map["city"], Value::from("Paris")),
            other => panic!("expected map, got {:?}", other),
        }
    }

    #[test]
    fn test_equality_is_type_strict() {
        assert!(Value::from(4.0).loosely_equals(&Value::from(4.0)));
        assert!(!Value::from(4.0).loosely_equals(&Value::from("4")));
        assert!(!Value::from(true).loosely_equals(&Value::from("true")));
        assert!(Value::Missing.loosely_equals(&Value::Missing));
    }

    #[test]
    fn test_time_compares_as_its_text() {
        let t = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap();
        let date = Value::Time(t, "2024-01-31".to_string());
        assert!(date.loosely_equals(&Value::from("2024-01-31")));
        assert!(Value::from("2024-01-31").loosely_equals(&date));
        assert!(!date.loosely_equals(&Value::from("2024-01-31T00:00:00Z")));
        assert_eq!(date.as_str(), Some("2024-01-31"));
        assert_eq!(date.to_string(), "2024-01-31");
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(Value::from("12.5").as_number(), Some(12.5));
        assert_eq!(Value::from("abc").as_number(), None);
        assert_eq!(Value::from(true).as_number(), None);
        let t = Utc.with_ymd_and_hms(1970, 1, 1, 0, 1, 0).unwrap();
        assert_eq!(
            Value::Time(t, "1970-01-01T00:01:00Z".to_string()).as_number(),
            Some(60.0)
        );
        assert_eq!(Value::from("1970-01-02").as_number(), Some(86400.0));
    }

    #[test]
    fn test_non_finite_strings_are_not_numbers() {
        for text in ["NaN", "inf", "-infinity", "Infinity"] {
            assert_eq!(Value::from(text).as_number(), None, "{}", text);
        }
    }

    #[test]
    fn test_parse_time_forms() {
        assert!(parse_time("2024-01-31").is_some());
        assert!(parse_time("2024-01-31T10:00:00+02:00").is_some());
        assert!(parse_time("2024-13-01").is_none());
        assert!(parse_time("Jan 31").is_none());
    }
}

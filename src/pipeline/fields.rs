// SPDX-License-Identifier: MIT

//! Field map access by dotted path
//!
//! A path like `location.city` walks nested objects one segment at a time.
//! A numeric segment addresses an element of an array (`tags.0`).

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};

use super::error::FieldError;

/// Nested key-value structure carried by an event
pub type FieldMap = Map<String, Value>;

static TIME_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%\{\+([^}]+)\}").expect("valid time marker pattern"));
static FIELD_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%\{\[?([^}]*[^\]])\]?\}").expect("valid field marker pattern"));

fn not_found(path: &str) -> FieldError {
    FieldError::PathNotFound {
        path: path.to_string(),
    }
}

fn child<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(obj) => obj.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Get the value at `path`
pub fn get<'a>(map: &'a FieldMap, path: &str) -> Result<&'a Value, FieldError> {
    let mut parts = path.split('.');
    let first = parts.next().unwrap_or_default();
    let mut current = map.get(first).ok_or_else(|| not_found(path))?;
    for part in parts {
        current = child(current, part).ok_or_else(|| not_found(path))?;
    }
    Ok(current)
}

/// Get every value matching `path`
///
/// Non-numeric segments applied to an array fan out over its elements, `*`
/// matches every child, and a leaf array contributes its elements.
pub fn get_all<'a>(map: &'a FieldMap, path: &str) -> Vec<&'a Value> {
    let mut parts = path.split('.');
    let first = parts.next().unwrap_or_default();
    let mut current: Vec<&Value> = if first == "*" {
        map.values().collect()
    } else {
        map.get(first).into_iter().collect()
    };

    for part in parts {
        let mut next = Vec::new();
        for value in current {
            collect_segment(value, part, &mut next);
        }
        current = next;
    }

    current
        .into_iter()
        .flat_map(|v| match v {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            other => vec![other],
        })
        .collect()
}

fn collect_segment<'a>(value: &'a Value, part: &str, out: &mut Vec<&'a Value>) {
    match value {
        Value::Object(obj) if part == "*" => out.extend(obj.values()),
        Value::Object(obj) => out.extend(obj.get(part)),
        Value::Array(items) if part == "*" => out.extend(items.iter()),
        Value::Array(items) => match part.parse::<usize>() {
            Ok(i) => out.extend(items.get(i)),
            Err(_) => {
                for item in items {
                    collect_segment(item, part, out);
                }
            }
        },
        _ => {}
    }
}

/// Get the value at `path`, or an empty string when it is absent
pub fn get_or_empty(map: &FieldMap, path: &str) -> Value {
    get(map, path)
        .cloned()
        .unwrap_or_else(|_| Value::String(String::new()))
}

/// Set the value at `path`, creating intermediate objects as needed
pub fn set(map: &mut FieldMap, path: &str, value: Value) {
    let mut parts: Vec<&str> = path.split('.').collect();
    let last = parts.pop().unwrap_or_default();

    let mut current = map;
    for part in parts {
        let entry = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = match entry {
            Value::Object(obj) => obj,
            _ => unreachable!("entry was just replaced by an object"),
        };
    }
    current.insert(last.to_string(), value);
}

/// Render a field value as text
pub fn to_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Replace `%{[a][b]}` / `%{a.b}` markers with field values and `%{+FMT}`
/// markers with `timestamp` formatted as strftime `FMT`
pub fn interpolate(template: &str, map: &FieldMap, timestamp: &DateTime<Utc>) -> String {
    if !template.contains("%{") {
        return template.to_string();
    }

    let with_time = TIME_MARKER.replace_all(template, |caps: &Captures| {
        let format = &caps[1];
        if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            log::warn!("Invalid time format in '{}'", &caps[0]);
            return caps[0].to_string();
        }
        timestamp.format(format).to_string()
    });

    FIELD_MARKER
        .replace_all(&with_time, |caps: &Captures| {
            let path = caps[1].replace("][", ".");
            to_display(&get_or_empty(map, &path))
        })
        .into_owned()
}

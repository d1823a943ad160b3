// SPDX-License-Identifier: MIT

//! Event flowing between pipeline stages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{PipelineError, Result};
use super::fields::{self, FieldMap};

/// A single event: a message plus a nested field map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub fields: FieldMap,
    #[serde(rename = "@timestamp", default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Create an event with a message and no fields
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fields: FieldMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Create an event from an existing field map
    pub fn from_fields(fields: FieldMap) -> Self {
        let message = fields
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        Self {
            message,
            fields,
            timestamp: Utc::now(),
        }
    }

    /// Build an event from a JSON object
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self::from_fields(map)),
            other => Err(PipelineError::other(format!(
                "event must be a JSON object, got: {}",
                other
            ))),
        }
    }

    /// Set a field and return the event (builder style)
    pub fn with_field(mut self, path: &str, value: Value) -> Self {
        self.set(path, value);
        self
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        fields::get(&self.fields, path).ok()
    }

    pub fn set(&mut self, path: &str, value: Value) {
        fields::set(&mut self.fields, path, value);
    }

    /// Expand `%{…}` markers against this event
    pub fn interpolate(&self, template: &str) -> String {
        fields::interpolate(template, &self.fields, &self.timestamp)
    }

    /// Add tags to the `tags` field, skipping duplicates
    pub fn add_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut current: Vec<Value> = match self.fields.remove("tags") {
            Some(Value::Array(items)) => items,
            Some(Value::String(s)) => vec![Value::String(s)],
            _ => Vec::new(),
        };

        for tag in tags {
            let tag = self.interpolate(tag.as_ref());
            if !current.iter().any(|t| t.as_str() == Some(tag.as_str())) {
                current.push(Value::String(tag));
            }
        }

        self.fields.insert("tags".to_string(), Value::Array(current));
    }

    /// Serialize the field map, with the message, as a JSON object
    pub fn to_json(&self) -> Value {
        let mut map = self.fields.clone();
        if !self.message.is_empty() {
            map.entry("message".to_string())
                .or_insert_with(|| Value::String(self.message.clone()));
        }
        map.insert(
            "@timestamp".to_string(),
            Value::String(self.timestamp.to_rfc3339()),
        );
        Value::Object(map)
    }
}

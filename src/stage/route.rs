// SPDX-License-Identifier: MIT

//! Single-condition route stage
//!
//! Matching events go to [`PORT_SUCCESS`], everything else to
//! [`PORT_TRUNK`]. With `fork`, matching events are also copied to the trunk.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::expression::CompiledExpression;
use crate::pipeline::error::{Result, StageError};
use crate::pipeline::{Event, PortSender, Processor};

pub const PORT_SUCCESS: usize = 0;
pub const PORT_TRUNK: usize = 1;

#[derive(Debug, Default)]
pub struct RouteProcessor {
    name: String,
    condition: Option<(String, Arc<CompiledExpression>)>,
    fork: bool,
    add_tag: Vec<String>,
    add_field: BTreeMap<String, Value>,
}

impl RouteProcessor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the routing condition; it is compiled immediately
    pub fn with_condition(mut self, surface: &str) -> std::result::Result<Self, StageError> {
        let compiled = CompiledExpression::compile_surface(surface)
            .map_err(|source| StageError::InvalidBranch { index: 0, source })?;
        self.condition = Some((surface.to_string(), Arc::new(compiled)));
        Ok(self)
    }

    pub fn with_fork(mut self, fork: bool) -> Self {
        self.fork = fork;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.add_tag = tags;
        self
    }

    pub fn with_fields(mut self, fields: BTreeMap<String, Value>) -> Self {
        self.add_field = fields;
        self
    }

    fn matches(&self, event: &Event) -> bool {
        let Some((surface, compiled)) = &self.condition else {
            return true;
        };
        match compiled.evaluate_bool(event) {
            Ok(matched) => matched,
            Err(e) => {
                log::warn!("[{}] condition ({}) failed: {}", self.name, surface, e);
                false
            }
        }
    }

    fn decorate(&self, event: &mut Event) {
        for (path, value) in &self.add_field {
            let value = match value {
                Value::String(template) => Value::String(event.interpolate(template)),
                other => other.clone(),
            };
            event.set(path, value);
        }
        if !self.add_tag.is_empty() {
            event.add_tags(&self.add_tag);
        }
    }
}

impl Processor for RouteProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> usize {
        2
    }

    fn receive(&self, mut event: Event, output: &dyn PortSender) -> Result<()> {
        let matched = self.matches(&event);
        self.decorate(&mut event);

        if matched {
            if self.fork {
                output.send(event.clone(), PORT_TRUNK);
            }
            output.send(event, PORT_SUCCESS);
        } else {
            output.send(event, PORT_TRUNK);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ChannelSender;
    use serde_json::json;

    fn event(value: Value) -> Event {
        Event::from_json(value).unwrap()
    }

    #[test]
    fn test_no_condition_always_matches() {
        let route = RouteProcessor::new("r");
        let (sender, mut receivers) = ChannelSender::with_ports(2);
        route.receive(Event::new("m"), &sender).unwrap();
        assert_eq!(receivers[PORT_SUCCESS].try_recv().unwrap().message, "m");
        assert!(receivers[PORT_TRUNK].try_recv().is_err());
    }

    #[test]
    fn test_condition_splits_ports() {
        let route = RouteProcessor::new("r")
            .with_condition("[status] >= 500")
            .unwrap();
        let (sender, mut receivers) = ChannelSender::with_ports(2);

        route
            .receive(event(json!({"status": 503, "message": "bad"})), &sender)
            .unwrap();
        route
            .receive(event(json!({"status": 200, "message": "ok"})), &sender)
            .unwrap();

        assert_eq!(receivers[PORT_SUCCESS].try_recv().unwrap().message, "bad");
        assert_eq!(receivers[PORT_TRUNK].try_recv().unwrap().message, "ok");
    }

    #[test]
    fn test_evaluation_error_goes_to_trunk() {
        let route = RouteProcessor::new("r")
            .with_condition("[status] >= 500")
            .unwrap();
        let (sender, mut receivers) = ChannelSender::with_ports(2);
        route.receive(Event::new("no status"), &sender).unwrap();
        assert!(receivers[PORT_SUCCESS].try_recv().is_err());
        assert_eq!(receivers[PORT_TRUNK].try_recv().unwrap().message, "no status");
    }

    #[test]
    fn test_fork_copies_to_trunk() {
        let route = RouteProcessor::new("r")
            .with_condition("true")
            .unwrap()
            .with_fork(true);
        let (sender, mut receivers) = ChannelSender::with_ports(2);
        route.receive(Event::new("m"), &sender).unwrap();
        assert_eq!(receivers[PORT_SUCCESS].try_recv().unwrap().message, "m");
        assert_eq!(receivers[PORT_TRUNK].try_recv().unwrap().message, "m");
    }

    #[test]
    fn test_decorates_events() {
        let mut fields = BTreeMap::new();
        fields.insert("routed.by".to_string(), json!("%{host}"));
        fields.insert("priority".to_string(), json!(3));
        let route = RouteProcessor::new("r")
            .with_tags(vec!["routed_%{[host]}".to_string()])
            .with_fields(fields);

        let (sender, mut receivers) = ChannelSender::with_ports(2);
        route
            .receive(event(json!({"host": "web1"})), &sender)
            .unwrap();

        let out = receivers[PORT_SUCCESS].try_recv().unwrap();
        assert_eq!(out.get("routed.by"), Some(&json!("web1")));
        assert_eq!(out.get("priority"), Some(&json!(3)));
        assert_eq!(out.get("tags"), Some(&json!(["routed_web1"])));
    }

    #[test]
    fn test_invalid_condition() {
        let err = RouteProcessor::new("r").with_condition("[a] ==").unwrap_err();
        assert!(matches!(err, StageError::InvalidBranch { index: 0, .. }));
    }
}

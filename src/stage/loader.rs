// SPDX-License-Identifier: MIT

//! Stage loader - YAML file loading and stage construction

use std::fs;
use std::path::Path;
use std::sync::Arc;

use super::route::RouteProcessor;
use super::types::StageDefinition;
use super::when::WhenProcessor;
use crate::pipeline::error::{PipelineError, Result, StageError};
use crate::pipeline::Processor;

/// Loads stage definitions and builds processors from them
pub struct StageLoader;

impl StageLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a stage definition from a YAML file
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<StageDefinition> {
        let content = fs::read_to_string(path)?;
        Self::parse_yaml(&content)
    }

    /// Parse a stage definition from a YAML string
    pub fn parse_yaml(content: &str) -> Result<StageDefinition> {
        let def: StageDefinition = serde_yaml::from_str(content)?;
        Ok(def)
    }

    /// Build a processor from a definition
    pub fn build(&self, def: &StageDefinition) -> Result<Arc<dyn Processor>> {
        match def.kind.to_lowercase().as_str() {
            "when" => {
                if def.condition.is_some() || def.fork {
                    return Err(PipelineError::config(format!(
                        "when stage '{}' takes `expressions`, not `condition` or `fork`",
                        def.name
                    )));
                }
                let branches = def.expressions.clone();
                let when = if def.eager {
                    WhenProcessor::configure(&def.name, branches)?
                } else {
                    WhenProcessor::new(&def.name, branches)?
                };
                log::debug!(
                    "Built when stage '{}' with {} branches",
                    def.name,
                    when.ports()
                );
                Ok(Arc::new(when))
            }
            "route" => {
                if !def.expressions.is_empty() {
                    return Err(PipelineError::config(format!(
                        "route stage '{}' takes a single `condition`, not `expressions`",
                        def.name
                    )));
                }
                let mut route = RouteProcessor::new(&def.name)
                    .with_fork(def.fork)
                    .with_tags(def.add_tag.clone())
                    .with_fields(def.add_field.clone());
                if let Some(condition) = &def.condition {
                    route = route.with_condition(condition)?;
                }
                log::debug!("Built route stage '{}'", def.name);
                Ok(Arc::new(route))
            }
            other => Err(StageError::UnknownKind(other.to_string()).into()),
        }
    }

    /// Load and build in one step
    pub fn load_processor<P: AsRef<Path>>(&self, path: P) -> Result<Arc<dyn Processor>> {
        let def = self.load(path)?;
        self.build(&def)
    }
}

impl Default for StageLoader {
    fn default() -> Self {
        Self::new()
    }
}

// SPDX-License-Identifier: MIT

//! Conditional router
//!
//! Branches are tried in ascending index order. The first one that evaluates
//! to `true` receives the event on the port of the same index; nothing else
//! is tried. A branch that fails to evaluate counts as `false`.

use crate::expression::Bindings;
use crate::pipeline::error::{Result, StageError};
use crate::pipeline::{Event, PortSender, Processor};

use super::cache::ExpressionCache;
use super::types::BranchTable;

/// Outcome of routing one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Forward to this port
    Routed(usize),
    /// No branch matched
    Unmatched,
}

/// Stage that routes each event to the first matching branch
#[derive(Debug)]
pub struct WhenProcessor {
    name: String,
    branches: BranchTable,
    cache: ExpressionCache,
}

impl WhenProcessor {
    /// Create a router that compiles each branch on first use
    pub fn new(name: impl Into<String>, branches: BranchTable) -> std::result::Result<Self, StageError> {
        validate(&branches)?;
        Ok(Self {
            name: name.into(),
            branches,
            cache: ExpressionCache::new(),
        })
    }

    /// Create a router and compile every branch up front
    ///
    /// Syntax errors and unknown functions are returned here instead of
    /// being reported on every event.
    pub fn configure(
        name: impl Into<String>,
        branches: BranchTable,
    ) -> std::result::Result<Self, StageError> {
        let processor = Self::new(name, branches)?;
        for (&index, surface) in &processor.branches {
            processor
                .cache
                .get_or_compile(index, surface)
                .map_err(|source| StageError::InvalidBranch { index, source })?;
        }
        Ok(processor)
    }

    /// Pick the port for an event
    pub fn decide(&self, bindings: &dyn Bindings) -> Decision {
        for (&index, surface) in &self.branches {
            let result = self
                .cache
                .get_or_compile(index, surface)
                .and_then(|compiled| compiled.evaluate_bool(bindings));

            match result {
                Ok(true) => return Decision::Routed(index),
                Ok(false) => {}
                Err(e) => {
                    log::warn!(
                        "[{}] branch {} ({}) failed: {}",
                        self.name,
                        index,
                        surface,
                        e
                    );
                }
            }
        }
        Decision::Unmatched
    }
}

fn validate(branches: &BranchTable) -> std::result::Result<(), StageError> {
    if branches.is_empty() {
        return Err(StageError::EmptyBranchTable);
    }
    for (expected, &found) in branches.keys().enumerate() {
        if found != expected {
            return Err(StageError::NonContiguousBranches { expected, found });
        }
    }
    Ok(())
}

impl Processor for WhenProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> usize {
        self.branches.len()
    }

    fn receive(&self, event: Event, output: &dyn PortSender) -> Result<()> {
        match self.decide(&event) {
            Decision::Routed(port) => {
                output.send(event, port);
            }
            Decision::Unmatched => {
                log::debug!("[{}] no branch matched, event not forwarded", self.name);
            }
        }
        Ok(())
    }
}

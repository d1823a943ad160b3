// SPDX-License-Identifier: MIT

//! YAML schema types for stage definitions

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Branch index to surface expression, evaluated in ascending index order
pub type BranchTable = BTreeMap<usize, String>;

/// Top-level stage definition
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StageDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Stage kind: "when" or "route"
    pub kind: String,
    /// Compile every expression while building the stage (default: true)
    #[serde(default = "default_eager")]
    pub eager: bool,
    /// Branch table (for `when` stages)
    #[serde(default)]
    pub expressions: BranchTable,
    /// Routing condition (for `route` stages); absent means always true
    pub condition: Option<String>,
    /// Also send matched events to the trunk port (for `route` stages)
    #[serde(default)]
    pub fork: bool,
    /// Tags added to every event, `%{...}` interpolated
    #[serde(default)]
    pub add_tag: Vec<String>,
    /// Fields set on every event; string values are `%{...}` interpolated
    #[serde(default)]
    pub add_field: BTreeMap<String, serde_json::Value>,
}

fn default_eager() -> bool {
    true
}

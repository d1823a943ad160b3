// SPDX-License-Identifier: MIT

//! Routing stages built from YAML definitions
//!
//! - `when` - ordered branch table, first matching branch wins
//! - `route` - one condition, success and trunk ports

pub mod cache;
pub mod loader;
pub mod route;
pub mod types;
pub mod when;

pub use cache::ExpressionCache;
pub use loader::StageLoader;
pub use route::{RouteProcessor, PORT_SUCCESS, PORT_TRUNK};
pub use types::{BranchTable, StageDefinition};
pub use when::{Decision, WhenProcessor};

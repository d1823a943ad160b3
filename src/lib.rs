// SPDX-License-Identifier: MIT

//! Conditional routing for event pipelines
//!
//! Stages decide, per event, which output port to send it to by evaluating
//! expressions such as `[location][city] == "Paris"` against the event's
//! fields.

pub mod expression;
pub mod pipeline;
pub mod stage;

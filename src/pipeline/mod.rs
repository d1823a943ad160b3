// SPDX-License-Identifier: MIT

//! Pipeline building blocks shared by every stage
//!
//! - `Event` - the packet passed between stages
//! - `fields` - dotted-path access into an event's field map
//! - `Processor` / `PortSender` - stage and output port contracts

pub mod error;
pub mod event;
pub mod fields;
pub mod processor;

pub use error::{ExpressionError, FieldError, PipelineError, Result, StageError};
pub use event::Event;
pub use fields::FieldMap;
pub use processor::{ChannelSender, PortSender, Processor};

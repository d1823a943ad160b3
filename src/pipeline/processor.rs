// SPDX-License-Identifier: MIT

//! Processor and output port abstractions
//!
//! A processor receives one event at a time and forwards it to zero or more
//! numbered output ports through a `PortSender`.

use std::collections::HashMap;
use tokio::sync::mpsc;

use super::error::Result;
use super::event::Event;

/// Forwards events to numbered output ports
pub trait PortSender: Send + Sync {
    /// Send `event` to `port`. Returns false when nothing listens on it.
    fn send(&self, event: Event, port: usize) -> bool;
}

/// Core trait for pipeline stages
///
/// `receive` never blocks: it evaluates in memory and hands the event to the
/// sender. It may be called from several threads at once.
pub trait Processor: Send + Sync {
    /// Returns the stage name
    fn name(&self) -> &str;

    /// Number of output ports this stage can send to
    fn ports(&self) -> usize;

    /// Process one event
    fn receive(&self, event: Event, output: &dyn PortSender) -> Result<()>;
}

/// Port sender backed by unbounded tokio channels, one per port
#[derive(Clone, Default)]
pub struct ChannelSender {
    ports: HashMap<usize, mpsc::UnboundedSender<Event>>,
}

impl ChannelSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sender with `count` connected ports, returning the receivers
    /// in port order
    pub fn with_ports(count: usize) -> (Self, Vec<mpsc::UnboundedReceiver<Event>>) {
        let mut sender = Self::new();
        let receivers = (0..count).map(|port| sender.connect(port)).collect();
        (sender, receivers)
    }

    /// Connect a port, replacing any previous channel on it
    pub fn connect(&mut self, port: usize) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.ports.insert(port, tx);
        rx
    }
}

impl PortSender for ChannelSender {
    fn send(&self, event: Event, port: usize) -> bool {
        match self.ports.get(&port) {
            Some(tx) => tx.send(event).is_ok(),
            None => {
                log::warn!("No listener on port {}, event dropped", port);
                false
            }
        }
    }
}

//! Passive accumulator.

use crate::dynamics::Dynamics;
use crate::error::SimResult;
use crate::event::ExternalEvent;
use crate::time::Time;

/// Stores every value it receives and never fires spontaneously.
///
/// Observation ports: `size` (number of stored values), `last` (the most
/// recently stored value).
#[derive(Debug, Default)]
pub struct Storage {
    values: Vec<serde_json::Value>,
}

impl Storage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored values, in arrival order.
    pub fn values(&self) -> &[serde_json::Value] {
        &self.values
    }
}

impl Dynamics for Storage {
    fn init(&mut self, _time: Time) -> SimResult<Time> {
        self.values.clear();
        Ok(Time::INFINITY)
    }

    fn external_transition(&mut self, events: &[ExternalEvent], _time: Time) -> SimResult<()> {
        for event in events {
            self.values.push(event.value.clone());
        }
        Ok(())
    }

    fn observation(&self, port: &str) -> Option<serde_json::Value> {
        match port {
            "size" => Some(serde_json::json!(self.values.len())),
            "last" => self.values.last().cloned(),
            _ => None,
        }
    }
}

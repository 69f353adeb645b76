//! Observation sink capability.
//!
//! The kernel never decides what observations mean or where they go; it
//! calls an injected [`Observer`] whenever an observable port fires. The
//! concrete sink — console print, in-memory matrix, file writer — lives
//! entirely outside the kernel.

use serde::{Deserialize, Serialize};

use crate::time::Time;

/// One delivered observation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    /// Dot-separated path of the observed model.
    pub model: String,
    /// The observation port queried.
    pub port: String,
    /// Simulated time of the observation.
    pub time: f64,
    /// The observed value.
    pub value: serde_json::Value,
}

/// Receives observation values from the coordinator.
pub trait Observer: Send {
    /// Called whenever an observable port produces a value.
    fn notify(&mut self, model: &str, port: &str, time: Time, value: serde_json::Value);
}

/// An observer that discards everything.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn notify(&mut self, _model: &str, _port: &str, _time: Time, _value: serde_json::Value) {}
}

/// An observer that keeps every observation in memory, mostly for tests
/// and small in-process experiments.
#[derive(Debug, Default)]
pub struct MemoryObserver {
    records: Vec<ObservationRecord>,
}

impl MemoryObserver {
    /// Creates an empty observer.
    pub fn new() -> Self {
        Self::default()
    }

    /// All records collected so far, in delivery order.
    pub fn records(&self) -> &[ObservationRecord] {
        &self.records
    }

    /// Records for one model/port pair.
    pub fn records_for(&self, model: &str, port: &str) -> Vec<&ObservationRecord> {
        self.records
            .iter()
            .filter(|r| r.model == model && r.port == port)
            .collect()
    }

    /// Consumes the observer, returning the collected records.
    pub fn into_records(self) -> Vec<ObservationRecord> {
        self.records
    }
}

impl Observer for MemoryObserver {
    fn notify(&mut self, model: &str, port: &str, time: Time, value: serde_json::Value) {
        self.records.push(ObservationRecord {
            model: model.to_string(),
            port: port.to_string(),
            time: time.as_f64(),
            value,
        });
    }
}

//! Periodic event source.

use crate::dynamics::Dynamics;
use crate::error::SimResult;
use crate::event::ExternalEvent;
use crate::graph::Conditions;
use crate::time::Time;

/// Emits an event on its output port at a fixed period.
///
/// Conditions:
/// - `period` (number, default `1.0`) — delay between firings
/// - `start` (number, default `0.0`) — delay before the first firing
/// - `port` (string, default `"out"`) — output port name
///
/// The payload of each event is the firing counter, starting at 0.
/// Observation port `count` reports how many times the generator has fired.
#[derive(Debug)]
pub struct Generator {
    period: Time,
    start: Time,
    port: String,
    count: u64,
}

impl Generator {
    /// Creates a generator with the given period, first firing at the
    /// initialization time.
    pub fn new(period: f64) -> Self {
        Self {
            period: Time::new(period),
            start: Time::ZERO,
            port: "out".to_string(),
            count: 0,
        }
    }

    /// Delays the first firing by `start`.
    pub fn with_start(mut self, start: f64) -> Self {
        self.start = Time::new(start);
        self
    }

    /// Renames the output port.
    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = port.into();
        self
    }

    /// Builds a generator from a condition set.
    pub fn from_conditions(conditions: &Conditions) -> Self {
        let period = conditions
            .get("period")
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(1.0);
        let start = conditions
            .get("start")
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(0.0);
        let port = conditions
            .get("port")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("out")
            .to_string();
        Self {
            period: Time::new(period),
            start: Time::new(start),
            port,
            count: 0,
        }
    }

    /// Number of firings so far.
    pub fn count(&self) -> u64 {
        self.count
    }
}

impl Dynamics for Generator {
    fn init(&mut self, _time: Time) -> SimResult<Time> {
        self.count = 0;
        Ok(self.start)
    }

    fn output(&self, _time: Time) -> SimResult<Vec<ExternalEvent>> {
        Ok(vec![ExternalEvent::new(
            self.port.clone(),
            serde_json::json!(self.count),
        )])
    }

    fn internal_transition(&mut self, _time: Time) -> SimResult<()> {
        self.count += 1;
        Ok(())
    }

    fn time_advance(&self) -> Time {
        self.period
    }

    fn observation(&self, port: &str) -> Option<serde_json::Value> {
        match port {
            "count" => Some(serde_json::json!(self.count)),
            _ => None,
        }
    }
}

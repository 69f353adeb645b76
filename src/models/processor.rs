//! Single-server queueing processor.

use std::collections::VecDeque;

use crate::dynamics::Dynamics;
use crate::error::SimResult;
use crate::event::ExternalEvent;
use crate::graph::Conditions;
use crate::time::Time;

/// Serves jobs one at a time with a fixed service delay.
///
/// Jobs arrive on the input port and queue behind the one in service; each
/// finished job is re-emitted on the output port. A job arriving exactly
/// when one completes is handled by the default confluent policy: the
/// completion fires first, then the arrival is queued (and possibly starts
/// service immediately).
///
/// Conditions:
/// - `service_time` (number, default `1.0`)
/// - `in_port` (string, default `"in"`)
/// - `out_port` (string, default `"out"`)
///
/// Observation ports: `queue` (waiting jobs), `processed` (completed jobs).
#[derive(Debug)]
pub struct Processor {
    service_time: Time,
    in_port: String,
    out_port: String,
    queue: VecDeque<serde_json::Value>,
    in_service: Option<serde_json::Value>,
    completion: Option<Time>,
    sigma: Time,
    processed: u64,
}

impl Processor {
    /// Creates an idle processor with the given service time.
    pub fn new(service_time: f64) -> Self {
        Self {
            service_time: Time::new(service_time),
            in_port: "in".to_string(),
            out_port: "out".to_string(),
            queue: VecDeque::new(),
            in_service: None,
            completion: None,
            sigma: Time::INFINITY,
            processed: 0,
        }
    }

    /// Builds a processor from a condition set.
    pub fn from_conditions(conditions: &Conditions) -> Self {
        let service_time = conditions
            .get("service_time")
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(1.0);
        let mut processor = Self::new(service_time);
        if let Some(port) = conditions.get("in_port").and_then(serde_json::Value::as_str) {
            processor.in_port = port.to_string();
        }
        if let Some(port) = conditions.get("out_port").and_then(serde_json::Value::as_str) {
            processor.out_port = port.to_string();
        }
        processor
    }

    /// Jobs completed so far.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    fn start_next(&mut self, time: Time) {
        match self.queue.pop_front() {
            Some(job) => {
                self.in_service = Some(job);
                self.completion = Some(time + self.service_time);
                self.sigma = self.service_time;
            }
            None => {
                self.in_service = None;
                self.completion = None;
                self.sigma = Time::INFINITY;
            }
        }
    }
}

impl Dynamics for Processor {
    fn init(&mut self, _time: Time) -> SimResult<Time> {
        self.queue.clear();
        self.in_service = None;
        self.completion = None;
        self.sigma = Time::INFINITY;
        self.processed = 0;
        Ok(Time::INFINITY)
    }

    fn output(&self, _time: Time) -> SimResult<Vec<ExternalEvent>> {
        match &self.in_service {
            Some(job) => Ok(vec![ExternalEvent::new(self.out_port.clone(), job.clone())]),
            None => Ok(Vec::new()),
        }
    }

    fn internal_transition(&mut self, time: Time) -> SimResult<()> {
        // Completion of the job in service.
        if self.in_service.take().is_some() {
            self.processed += 1;
        }
        self.start_next(time);
        Ok(())
    }

    fn external_transition(&mut self, events: &[ExternalEvent], time: Time) -> SimResult<()> {
        for event in events {
            if event.port == self.in_port {
                self.queue.push_back(event.value.clone());
            }
        }
        match self.completion {
            // Still busy; the remaining service time shrinks because sigma
            // is measured from this transition.
            Some(completion) => self.sigma = completion.checked_sub(time)?,
            None => self.start_next(time),
        }
        Ok(())
    }

    fn time_advance(&self) -> Time {
        self.sigma
    }

    fn observation(&self, port: &str) -> Option<serde_json::Value> {
        match port {
            "queue" => Some(serde_json::json!(self.queue.len())),
            "processed" => Some(serde_json::json!(self.processed)),
            _ => None,
        }
    }
}

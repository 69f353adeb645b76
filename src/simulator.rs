//! The runtime binding between one atomic model and its dynamics.
//!
//! A [`Simulator`] caches the two times the scheduler needs — the time of
//! the most recent transition and the time of the next scheduled internal
//! event — and enforces the lifecycle state machine:
//!
//! ```text
//! Uninitialized → Idle → (internal | external | confluent) → Idle → … → Finished
//! ```
//!
//! Any transition attempted outside `Idle` fails with a lifecycle error; a
//! `Finished` simulator never transitions again.

use crate::dynamics::{Dynamics, StructuralRequest};
use crate::error::{SimError, SimResult};
use crate::event::ExternalEvent;
use crate::graph::ModelId;
use crate::time::Time;

/// Lifecycle phase of a simulator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Constructed but not yet initialized.
    Uninitialized,
    /// Ready to transition.
    Idle,
    /// Terminal; no further transitions are legal.
    Finished,
}

impl Phase {
    fn name(self) -> &'static str {
        match self {
            Phase::Uninitialized => "uninitialized",
            Phase::Idle => "idle",
            Phase::Finished => "finished",
        }
    }
}

/// Binds one atomic model instance to its [`Dynamics`] implementation.
pub struct Simulator {
    model: ModelId,
    name: String,
    dynamics: Box<dyn Dynamics>,
    last_event_time: Time,
    next_event_time: Time,
    phase: Phase,
}

impl Simulator {
    /// Creates an uninitialized simulator for the given atomic model.
    pub fn new(model: ModelId, name: impl Into<String>, dynamics: Box<dyn Dynamics>) -> Self {
        Self {
            model,
            name: name.into(),
            dynamics,
            last_event_time: Time::ZERO,
            next_event_time: Time::INFINITY,
            phase: Phase::Uninitialized,
        }
    }

    /// The atomic model this simulator drives.
    pub fn model(&self) -> ModelId {
        self.model
    }

    /// The model's name, used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Time of the most recent transition.
    pub fn last_event_time(&self) -> Time {
        self.last_event_time
    }

    /// Time of the next scheduled internal event.
    pub fn next_event_time(&self) -> Time {
        self.next_event_time
    }

    fn require_phase(&self, expected: Phase, operation: &'static str) -> SimResult<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(SimError::Lifecycle {
                model: self.name.clone(),
                operation,
                phase: self.phase.name(),
            })
        }
    }

    fn reschedule_after(&mut self, time: Time) {
        self.last_event_time = time;
        self.next_event_time = time + self.dynamics.time_advance();
    }

    /// Initializes the dynamics and schedules the first internal event.
    ///
    /// Returns the resulting `next_event_time`.
    pub fn init(&mut self, time: Time) -> SimResult<Time> {
        self.require_phase(Phase::Uninitialized, "init")?;
        let delay = self.dynamics.init(time)?;
        self.last_event_time = time;
        self.next_event_time = time + delay;
        self.phase = Phase::Idle;
        Ok(self.next_event_time)
    }

    /// Queries the model's output, without mutating it.
    pub fn output(&self, time: Time) -> SimResult<Vec<ExternalEvent>> {
        self.require_phase(Phase::Idle, "output")?;
        self.dynamics.output(time)
    }

    /// Fires the internal transition at `time` and returns the new
    /// `next_event_time`.
    pub fn internal_transition(&mut self, time: Time) -> SimResult<Time> {
        self.require_phase(Phase::Idle, "internal_transition")?;
        self.dynamics.internal_transition(time)?;
        self.reschedule_after(time);
        Ok(self.next_event_time)
    }

    /// Fires the external transition with the batched input events.
    pub fn external_transition(
        &mut self,
        events: &[ExternalEvent],
        time: Time,
    ) -> SimResult<Time> {
        self.require_phase(Phase::Idle, "external_transition")?;
        self.dynamics.external_transition(events, time)?;
        self.reschedule_after(time);
        Ok(self.next_event_time)
    }

    /// Fires the confluent transition (input arrived exactly at the
    /// scheduled internal time).
    pub fn confluent_transition(
        &mut self,
        time: Time,
        events: &[ExternalEvent],
    ) -> SimResult<Time> {
        self.require_phase(Phase::Idle, "confluent_transition")?;
        self.dynamics.confluent_transition(time, events)?;
        self.reschedule_after(time);
        Ok(self.next_event_time)
    }

    /// Read-only observation query.
    pub fn observation(&self, port: &str) -> Option<serde_json::Value> {
        self.dynamics.observation(port)
    }

    /// Drains structural-change intents accumulated by the dynamics.
    pub fn structural_requests(&mut self) -> Vec<StructuralRequest> {
        self.dynamics.structural_requests()
    }

    /// Invokes the terminal hook and moves the simulator to `Finished`.
    pub fn finish(&mut self, time: Time) {
        if self.phase != Phase::Finished {
            self.dynamics.finish(time);
            self.phase = Phase::Finished;
        }
    }
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("model", &self.model)
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field("last_event_time", &self.last_event_time)
            .field("next_event_time", &self.next_event_time)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fires every `period`, counting transitions.
    struct Periodic {
        period: f64,
        fired: u64,
    }

    impl Periodic {
        fn new(period: f64) -> Self {
            Self { period, fired: 0 }
        }
    }

    impl Dynamics for Periodic {
        fn init(&mut self, _time: Time) -> SimResult<Time> {
            Ok(Time::ZERO)
        }

        fn output(&self, _time: Time) -> SimResult<Vec<ExternalEvent>> {
            Ok(vec![ExternalEvent::new("out", serde_json::json!(self.fired))])
        }

        fn internal_transition(&mut self, _time: Time) -> SimResult<()> {
            self.fired += 1;
            Ok(())
        }

        fn time_advance(&self) -> Time {
            Time::new(self.period)
        }
    }

    #[test]
    fn test_init_schedules_first_event() {
        let mut sim = Simulator::new(1, "p", Box::new(Periodic::new(5.0)));
        assert_eq!(sim.phase(), Phase::Uninitialized);

        let next = sim.init(Time::ZERO).unwrap();
        assert_eq!(next, Time::ZERO);
        assert_eq!(sim.phase(), Phase::Idle);
    }

    #[test]
    fn test_internal_transition_advances_schedule() {
        let mut sim = Simulator::new(1, "p", Box::new(Periodic::new(5.0)));
        sim.init(Time::ZERO).unwrap();

        let next = sim.internal_transition(Time::ZERO).unwrap();
        assert_eq!(next, Time::new(5.0));
        assert_eq!(sim.last_event_time(), Time::ZERO);

        let next = sim.internal_transition(Time::new(5.0)).unwrap();
        assert_eq!(next, Time::new(10.0));
        assert_eq!(sim.last_event_time(), Time::new(5.0));
    }

    #[test]
    fn test_transition_before_init_fails() {
        let mut sim = Simulator::new(1, "p", Box::new(Periodic::new(5.0)));
        let err = sim.internal_transition(Time::ZERO).unwrap_err();
        assert!(matches!(err, SimError::Lifecycle { phase: "uninitialized", .. }));
    }

    #[test]
    fn test_double_init_fails() {
        let mut sim = Simulator::new(1, "p", Box::new(Periodic::new(5.0)));
        sim.init(Time::ZERO).unwrap();
        let err = sim.init(Time::ZERO).unwrap_err();
        assert!(matches!(err, SimError::Lifecycle { .. }));
    }

    #[test]
    fn test_no_transition_after_finish() {
        let mut sim = Simulator::new(1, "p", Box::new(Periodic::new(5.0)));
        sim.init(Time::ZERO).unwrap();
        sim.finish(Time::new(20.0));
        assert_eq!(sim.phase(), Phase::Finished);

        let events = vec![ExternalEvent::signal("in")];
        assert!(matches!(
            sim.internal_transition(Time::new(25.0)),
            Err(SimError::Lifecycle { phase: "finished", .. })
        ));
        assert!(matches!(
            sim.external_transition(&events, Time::new(25.0)),
            Err(SimError::Lifecycle { phase: "finished", .. })
        ));
        assert!(matches!(
            sim.confluent_transition(Time::new(25.0), &events),
            Err(SimError::Lifecycle { phase: "finished", .. })
        ));
        assert!(matches!(
            sim.output(Time::new(25.0)),
            Err(SimError::Lifecycle { phase: "finished", .. })
        ));
    }

    #[test]
    fn test_passive_model_never_schedules() {
        struct Passive;
        impl Dynamics for Passive {}

        let mut sim = Simulator::new(2, "sink", Box::new(Passive));
        let next = sim.init(Time::ZERO).unwrap();
        assert!(next.is_infinity());

        // An external input at t=3 leaves it passive.
        let next = sim
            .external_transition(&[ExternalEvent::signal("in")], Time::new(3.0))
            .unwrap();
        assert!(next.is_infinity());
        assert_eq!(sim.last_event_time(), Time::new(3.0));
    }
}

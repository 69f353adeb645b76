//! The outermost simulation driver.
//!
//! The [`RootCoordinator`] owns the simulated-time bounds and the terminal
//! condition, and exposes the four-call protocol consumed by whatever host
//! drives the kernel:
//!
//! ```text
//! load → init → run … run → finish
//! ```
//!
//! `run` executes exactly one global step and reports whether more remain;
//! callers loop `while root.run()?` and then call `finish` exactly once.
//! [`RootCoordinator::run_to_end`] packages that loop for hosts that do not
//! need to interleave their own work (deadline checks, cancellation)
//! between steps.

use tracing::debug;

use crate::coordinator::{Coordinator, CoordinatorStats};
use crate::error::{SimError, SimResult};
use crate::graph::ModelGraph;
use crate::observer::Observer;
use crate::registry::DynamicsRegistry;
use crate::time::Time;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RunState {
    Created,
    Loaded,
    Ready,
    Finished,
}

impl RunState {
    fn name(self) -> &'static str {
        match self {
            RunState::Created => "created",
            RunState::Loaded => "loaded",
            RunState::Ready => "ready",
            RunState::Finished => "finished",
        }
    }
}

/// Drives a whole simulation run between time bounds.
pub struct RootCoordinator {
    coordinator: Option<Coordinator>,
    begin: Time,
    end: Time,
    state: RunState,
}

impl RootCoordinator {
    /// Creates a driver starting at time zero with no end bound: the run
    /// terminates at quiescence.
    pub fn new() -> Self {
        Self {
            coordinator: None,
            begin: Time::ZERO,
            end: Time::INFINITY,
            state: RunState::Created,
        }
    }

    /// Sets the initialization time.
    pub fn with_begin(mut self, begin: Time) -> Self {
        self.begin = begin;
        self
    }

    /// Bounds the run: events scheduled strictly after `end` do not fire.
    pub fn with_end(mut self, end: Time) -> Self {
        self.end = end;
        self
    }

    /// Bounds the run to `duration` past the begin time.
    pub fn with_duration(mut self, duration: Time) -> Self {
        self.end = self.begin + duration;
        self
    }

    fn require_state(&self, expected: RunState, operation: &'static str) -> SimResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SimError::Lifecycle {
                model: "root".to_string(),
                operation,
                phase: self.state.name(),
            })
        }
    }

    fn coordinator_mut(&mut self, operation: &'static str) -> SimResult<&mut Coordinator> {
        let state = self.state;
        self.coordinator.as_mut().ok_or(SimError::Lifecycle {
            model: "root".to_string(),
            operation,
            phase: state.name(),
        })
    }

    /// Binds the model graph: one simulator per atomic model, event table
    /// populated.
    pub fn load(
        &mut self,
        graph: ModelGraph,
        registry: DynamicsRegistry,
        observer: Box<dyn Observer>,
    ) -> SimResult<()> {
        self.require_state(RunState::Created, "load")?;
        let mut coordinator = Coordinator::new(graph, registry, observer);
        coordinator.load()?;
        self.coordinator = Some(coordinator);
        self.state = RunState::Loaded;
        Ok(())
    }

    /// Initializes every simulator at the begin time and establishes the
    /// first schedule.
    pub fn init(&mut self) -> SimResult<()> {
        self.require_state(RunState::Loaded, "init")?;
        let begin = self.begin;
        self.coordinator_mut("init")?.init(begin)?;
        self.state = RunState::Ready;
        Ok(())
    }

    /// Executes one global step.
    ///
    /// Returns `false` when no more steps remain: the system is quiescent,
    /// or the next event lies beyond the end bound.
    pub fn run(&mut self) -> SimResult<bool> {
        self.require_state(RunState::Ready, "run")?;
        let end = self.end;
        let coordinator = self.coordinator_mut("run")?;
        if coordinator.next_time() > end {
            return Ok(false);
        }
        match coordinator.step()? {
            Some(_) => Ok(coordinator.next_time() <= end),
            None => Ok(false),
        }
    }

    /// Loops [`RootCoordinator::run`] to exhaustion, then calls
    /// [`RootCoordinator::finish`]. Returns the final simulated time.
    pub fn run_to_end(&mut self) -> SimResult<Time> {
        while self.run()? {}
        self.finish()?;
        Ok(self.current_time())
    }

    /// Invokes the terminal hook on every simulator. Must be called exactly
    /// once, after the run loop has ended.
    pub fn finish(&mut self) -> SimResult<()> {
        self.require_state(RunState::Ready, "finish")?;
        self.coordinator_mut("finish")?.finish()?;
        self.state = RunState::Finished;
        debug!("run finished");
        Ok(())
    }

    /// The simulated time of the most recent step (the begin time before
    /// any step fires).
    pub fn current_time(&self) -> Time {
        self.coordinator
            .as_ref()
            .map_or(self.begin, Coordinator::current_time)
    }

    /// Run counters, once loaded.
    pub fn stats(&self) -> Option<&CoordinatorStats> {
        self.coordinator.as_ref().map(Coordinator::stats)
    }

    /// The coordinator, once loaded. Read-only: structural mutation during
    /// a run goes through executive requests, never through this reference.
    pub fn coordinator(&self) -> Option<&Coordinator> {
        self.coordinator.as_ref()
    }
}

impl Default for RootCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

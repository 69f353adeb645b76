//! The simulation coordinator.
//!
//! The [`Coordinator`] owns the model graph, the event table, and every
//! simulator, and drives exactly one global step per [`Coordinator::step`]
//! call:
//!
//! 1. take the minimum next-event time `t*` and the full tie-break group,
//! 2. collect each imminent model's output and route it through the
//!    connection hierarchy, bagging events per destination simulator,
//! 3. fire internal transitions on imminent models without input, confluent
//!    transitions on imminent models with input, and external transitions
//!    on every other model that received input,
//! 4. reschedule each fired simulator at `t* + time_advance()`,
//! 5. apply the structural changes queued by executives during the step,
//! 6. report `t*`, or quiescence when the horizon is infinity.
//!
//! Fan-out is deterministic: every connection from a source port delivers,
//! and all events converging on one model arrive as a single batch to a
//! single transition call. Any error aborts the step with no partial
//! rollback; the graph and schedule keep their state from before the
//! failing step's transitions were applied.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, trace};

use crate::dynamics::{ModelContext, StructuralRequest};
use crate::error::{SimError, SimResult};
use crate::event::ExternalEvent;
use crate::graph::{ModelGraph, ModelId};
use crate::observer::Observer;
use crate::registry::DynamicsRegistry;
use crate::scheduler::EventTable;
use crate::simulator::Simulator;
use crate::time::Time;

/// Counters accumulated across a run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CoordinatorStats {
    /// Global steps executed.
    pub steps: u64,
    /// Internal transitions fired.
    pub internal_transitions: u64,
    /// External transitions fired.
    pub external_transitions: u64,
    /// Confluent transitions fired.
    pub confluent_transitions: u64,
    /// Events delivered to destination bags.
    pub events_routed: u64,
    /// Observation values pushed to the observer.
    pub observations: u64,
    /// Structural requests applied.
    pub structural_applied: u64,
}

/// Orchestrates one simulation over a model graph.
pub struct Coordinator {
    graph: ModelGraph,
    registry: DynamicsRegistry,
    observer: Box<dyn Observer>,
    simulators: BTreeMap<ModelId, Simulator>,
    schedule: EventTable,
    pending: Vec<StructuralRequest>,
    current_time: Time,
    stats: CoordinatorStats,
}

impl Coordinator {
    /// Creates a coordinator over the given graph.
    pub fn new(
        graph: ModelGraph,
        registry: DynamicsRegistry,
        observer: Box<dyn Observer>,
    ) -> Self {
        Self {
            graph,
            registry,
            observer,
            simulators: BTreeMap::new(),
            schedule: EventTable::new(),
            pending: Vec::new(),
            current_time: Time::ZERO,
            stats: CoordinatorStats::default(),
        }
    }

    /// The model graph being simulated.
    pub fn graph(&self) -> &ModelGraph {
        &self.graph
    }

    /// Current simulated time (time of the most recent step).
    pub fn current_time(&self) -> Time {
        self.current_time
    }

    /// Run counters.
    pub fn stats(&self) -> &CoordinatorStats {
        &self.stats
    }

    /// The simulator bound to an atomic model, if loaded.
    pub fn simulator(&self, model: ModelId) -> Option<&Simulator> {
        self.simulators.get(&model)
    }

    /// Number of live simulators.
    pub fn simulator_count(&self) -> usize {
        self.simulators.len()
    }

    fn bind_simulator(&mut self, model: ModelId) -> SimResult<()> {
        let info = self.graph.atomic_info(model)?.clone();
        let ctx = ModelContext {
            model,
            name: self.graph.name(model)?.to_string(),
            parent: self.graph.parent(model)?,
        };
        let dynamics = self
            .registry
            .instantiate(&info.dynamics, &ctx, &info.conditions)?;
        let path = self.graph.path(model)?;
        self.simulators
            .insert(model, Simulator::new(model, path, dynamics));
        self.schedule.insert(model, Time::INFINITY);
        Ok(())
    }

    /// Constructs one simulator per atomic model and populates the event
    /// table. Replaces any previous binding.
    pub fn load(&mut self) -> SimResult<()> {
        self.simulators.clear();
        self.schedule = EventTable::new();
        for model in self.graph.atomics() {
            self.bind_simulator(model)?;
        }
        debug!(simulators = self.simulators.len(), "model graph loaded");
        Ok(())
    }

    /// Initializes every simulator at `begin` and establishes the first
    /// schedule. Structural requests issued during initialization are
    /// applied before the first step.
    pub fn init(&mut self, begin: Time) -> SimResult<()> {
        self.current_time = begin;
        let models: Vec<ModelId> = self.simulators.keys().copied().collect();
        for model in models {
            let sim = self.expect_simulator_mut(model)?;
            let next = sim.init(begin)?;
            let requests = sim.structural_requests();
            self.schedule.reschedule(model, next);
            self.pending.extend(requests);
        }
        self.apply_pending(begin)?;
        debug!(time = %begin, "simulation initialized");
        Ok(())
    }

    /// The next event time on the horizon, infinity when nothing is
    /// scheduled to fire.
    pub fn next_time(&mut self) -> Time {
        self.schedule.peek_time().unwrap_or(Time::INFINITY)
    }

    /// Executes one global step.
    ///
    /// Returns the step time, or `None` when the system is quiescent (the
    /// horizon is infinity and no structural work is pending).
    pub fn step(&mut self) -> SimResult<Option<Time>> {
        match self.schedule.peek_time() {
            None => return Ok(None),
            Some(t) if t.is_infinity() => return Ok(None),
            Some(_) => {}
        }
        let Some((t, imminent)) = self.schedule.take_imminent() else {
            return Ok(None);
        };
        self.current_time = t;
        debug!(time = %t, imminent = imminent.len(), "step");

        // Collect outputs and route them before any state changes.
        let mut bags: BTreeMap<ModelId, Vec<ExternalEvent>> = BTreeMap::new();
        for &model in &imminent {
            let events = self.expect_simulator(model)?.output(t)?;
            for event in events {
                self.route(model, event, &mut bags)?;
            }
        }

        // Imminent models: internal without input, confluent with input.
        for &model in &imminent {
            let bag = bags.remove(&model);
            let sim = self.expect_simulator_mut(model)?;
            let next = match bag {
                None => {
                    let next = sim.internal_transition(t)?;
                    self.stats.internal_transitions += 1;
                    next
                }
                Some(events) => {
                    let next = sim.confluent_transition(t, &events)?;
                    self.stats.confluent_transitions += 1;
                    next
                }
            };
            self.schedule.reschedule(model, next);
            self.after_transition(model, t)?;
        }

        // Every remaining bag belongs to a non-imminent receiver.
        let external: Vec<(ModelId, Vec<ExternalEvent>)> = bags.into_iter().collect();
        for (model, events) in external {
            let sim = self.expect_simulator_mut(model)?;
            let next = sim.external_transition(&events, t)?;
            self.stats.external_transitions += 1;
            self.schedule.reschedule(model, next);
            self.after_transition(model, t)?;
        }

        self.apply_pending(t)?;
        self.stats.steps += 1;
        Ok(Some(t))
    }

    /// Invokes every simulator's terminal hook, flushes final observations,
    /// and moves all simulators to the finished phase.
    pub fn finish(&mut self) -> SimResult<()> {
        let t = self.current_time;
        let models: Vec<ModelId> = self.simulators.keys().copied().collect();
        for model in models {
            self.expect_simulator_mut(model)?.finish(t);
            self.emit_observations(model, t)?;
        }
        debug!(time = %t, "simulation finished");
        Ok(())
    }

    /// Stats snapshot as a JSON value.
    pub fn export_stats(&self) -> serde_json::Value {
        serde_json::json!({
            "current_time": self.current_time.as_f64(),
            "simulators": self.simulators.len(),
            "steps": self.stats.steps,
            "internal_transitions": self.stats.internal_transitions,
            "external_transitions": self.stats.external_transitions,
            "confluent_transitions": self.stats.confluent_transitions,
            "events_routed": self.stats.events_routed,
            "observations": self.stats.observations,
            "structural_applied": self.stats.structural_applied,
        })
    }

    fn expect_simulator(&self, model: ModelId) -> SimResult<&Simulator> {
        self.simulators
            .get(&model)
            .ok_or_else(|| SimError::ModelNotFound(format!("simulator for #{model}")))
    }

    fn expect_simulator_mut(&mut self, model: ModelId) -> SimResult<&mut Simulator> {
        self.simulators
            .get_mut(&model)
            .ok_or_else(|| SimError::ModelNotFound(format!("simulator for #{model}")))
    }

    fn route(
        &mut self,
        src: ModelId,
        event: ExternalEvent,
        bags: &mut BTreeMap<ModelId, Vec<ExternalEvent>>,
    ) -> SimResult<()> {
        if !self.graph.output_ports(src)?.contains(&event.port) {
            return Err(SimError::Routing {
                model: self.graph.path(src)?,
                port: event.port,
            });
        }
        for (dst, dst_port) in self.graph.route_from_output(src, &event.port)? {
            trace!(src, dst, port = %dst_port, "route");
            bags.entry(dst)
                .or_default()
                .push(ExternalEvent::new(dst_port, event.value.clone()));
            self.stats.events_routed += 1;
        }
        Ok(())
    }

    /// Collects observation values and structural requests after a
    /// transition on `model`.
    fn after_transition(&mut self, model: ModelId, time: Time) -> SimResult<()> {
        self.emit_observations(model, time)?;
        let sim = self.expect_simulator_mut(model)?;
        let requests = sim.structural_requests();
        self.pending.extend(requests);
        Ok(())
    }

    fn emit_observations(&mut self, model: ModelId, time: Time) -> SimResult<()> {
        let observables = self.graph.atomic_info(model)?.observables.clone();
        if observables.is_empty() {
            return Ok(());
        }
        let path = self.graph.path(model)?;
        for port in observables {
            let sim = self.expect_simulator(model)?;
            if let Some(value) = sim.observation(&port) {
                self.observer.notify(&path, &port, time, value);
                self.stats.observations += 1;
            }
        }
        Ok(())
    }

    fn resolve_endpoint(
        &self,
        parent: ModelId,
        name: &Option<String>,
    ) -> SimResult<ModelId> {
        match name {
            None => Ok(parent),
            Some(name) => self
                .graph
                .find_child(parent, name)?
                .ok_or_else(|| SimError::ModelNotFound(name.clone())),
        }
    }

    /// Applies the structural requests queued during the step that just
    /// completed. New atomic models are initialized at `time` and enter the
    /// schedule; removed models lose their simulators and schedule entries.
    fn apply_pending(&mut self, time: Time) -> SimResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let requests = std::mem::take(&mut self.pending);
        for request in requests {
            self.apply_request(request, time)?;
            self.stats.structural_applied += 1;
        }
        Ok(())
    }

    fn apply_request(&mut self, request: StructuralRequest, time: Time) -> SimResult<()> {
        match request {
            StructuralRequest::AddAtomic { parent, spec } => {
                let name = spec.name.clone();
                let model = self.graph.add_atomic(parent, spec)?;
                self.bind_simulator(model)?;
                let sim = self.expect_simulator_mut(model)?;
                let next = sim.init(time)?;
                self.schedule.reschedule(model, next);
                debug!(model, name = %name, time = %time, "atomic model spawned");
            }
            StructuralRequest::AddCoupled { parent, spec } => {
                let name = spec.name.clone();
                let model = self.graph.add_coupled(parent, spec)?;
                debug!(model, name = %name, "coupled model spawned");
            }
            StructuralRequest::RemoveModel { parent, name } => {
                let removed = self.graph.remove_model(parent, &name)?;
                for model in removed {
                    self.simulators.remove(&model);
                    self.schedule.remove(model);
                }
                debug!(name = %name, "model removed");
            }
            StructuralRequest::Connect {
                parent,
                kind,
                src,
                src_port,
                dst,
                dst_port,
            } => {
                let src = self.resolve_endpoint(parent, &src)?;
                let dst = self.resolve_endpoint(parent, &dst)?;
                self.graph.connect(parent, kind, src, src_port, dst, dst_port)?;
            }
            StructuralRequest::Disconnect {
                parent,
                kind,
                src,
                src_port,
                dst,
                dst_port,
            } => {
                let src = self.resolve_endpoint(parent, &src)?;
                let dst = self.resolve_endpoint(parent, &dst)?;
                self.graph
                    .disconnect(parent, kind, src, &src_port, dst, &dst_port)?;
            }
        }
        Ok(())
    }
}

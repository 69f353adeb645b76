//! Integration tests for the simulation protocol.
//!
//! These tests verify end-to-end DEVS semantics:
//! - interleaving of independent periodic models,
//! - event delivery through connections,
//! - confluent handling of simultaneous internal and external events,
//! - event conservation under fan-out and fan-in.

use std::sync::{Arc, Mutex};

use devsim::dynamics::Dynamics;
use devsim::observer::NoopObserver;
use devsim::registry::DynamicsRegistry;
use devsim::{
    AtomicSpec, ConnectionKind, Coordinator, ExternalEvent, ModelGraph, RootCoordinator, SimError,
    SimResult, Time,
};

// ============================================================================
// Test Dynamics
// ============================================================================

/// One recorded transition.
#[derive(Clone, Debug, PartialEq)]
struct LogEntry {
    model: &'static str,
    kind: &'static str,
    time: f64,
    values: Vec<serde_json::Value>,
}

type Log = Arc<Mutex<Vec<LogEntry>>>;

fn entries_for(log: &Log, model: &str, kind: &str) -> Vec<LogEntry> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|e| e.model == model && e.kind == kind)
        .cloned()
        .collect()
}

fn times_of(entries: &[LogEntry]) -> Vec<f64> {
    entries.iter().map(|e| e.time).collect()
}

/// A model that logs every transition it undergoes.
///
/// Fires its first internal event `first` after init, then every `period`;
/// when imminent it emits `emit` on its output port. Confluent transitions
/// are logged as a single call, never decomposed.
struct TraceModel {
    model: &'static str,
    log: Log,
    first: Time,
    period: Time,
    emit: Option<(String, serde_json::Value)>,
}

impl TraceModel {
    fn push(&self, kind: &'static str, time: Time, values: Vec<serde_json::Value>) {
        self.log.lock().unwrap().push(LogEntry {
            model: self.model,
            kind,
            time: time.as_f64(),
            values,
        });
    }
}

impl Dynamics for TraceModel {
    fn init(&mut self, _time: Time) -> SimResult<Time> {
        Ok(self.first)
    }

    fn output(&self, _time: Time) -> SimResult<Vec<ExternalEvent>> {
        match &self.emit {
            Some((port, value)) => Ok(vec![ExternalEvent::new(port.clone(), value.clone())]),
            None => Ok(Vec::new()),
        }
    }

    fn internal_transition(&mut self, time: Time) -> SimResult<()> {
        self.push("internal", time, Vec::new());
        Ok(())
    }

    fn external_transition(&mut self, events: &[ExternalEvent], time: Time) -> SimResult<()> {
        self.push(
            "external",
            time,
            events.iter().map(|e| e.value.clone()).collect(),
        );
        Ok(())
    }

    fn confluent_transition(&mut self, time: Time, events: &[ExternalEvent]) -> SimResult<()> {
        self.push(
            "confluent",
            time,
            events.iter().map(|e| e.value.clone()).collect(),
        );
        Ok(())
    }

    fn time_advance(&self) -> Time {
        self.period
    }
}

/// Registers a `TraceModel` factory under `id`.
fn register_trace(
    registry: &mut DynamicsRegistry,
    id: &'static str,
    log: &Log,
    first: Time,
    period: Time,
    emit: Option<(String, serde_json::Value)>,
) {
    let log = log.clone();
    registry.register(id, move |_ctx, _conditions| {
        Box::new(TraceModel {
            model: id,
            log: log.clone(),
            first,
            period,
            emit: emit.clone(),
        })
    });
}

// ============================================================================
// Independent periodic models interleave exactly
// ============================================================================

#[test]
fn test_two_periodic_models_interleave() {
    let log: Log = Log::default();
    let mut registry = DynamicsRegistry::new();
    register_trace(&mut registry, "A", &log, Time::ZERO, Time::new(5.0), None);
    register_trace(&mut registry, "B", &log, Time::ZERO, Time::new(3.0), None);

    let mut graph = ModelGraph::new("top");
    let root = graph.root();
    graph.add_atomic(root, AtomicSpec::new("a", "A")).unwrap();
    graph.add_atomic(root, AtomicSpec::new("b", "B")).unwrap();

    let mut driver = RootCoordinator::new().with_end(Time::new(20.0));
    driver.load(graph, registry, Box::new(NoopObserver)).unwrap();
    driver.init().unwrap();

    let mut step_times = Vec::new();
    loop {
        let more = driver.run().unwrap();
        step_times.push(driver.current_time().as_f64());
        if !more {
            break;
        }
    }
    driver.finish().unwrap();

    // The union of {0,5,10,15,20} and {0,3,6,9,12,15,18}, each shared
    // instant handled in a single step.
    assert_eq!(
        step_times,
        vec![0.0, 3.0, 5.0, 6.0, 9.0, 10.0, 12.0, 15.0, 18.0, 20.0]
    );

    let a_times = times_of(&entries_for(&log, "A", "internal"));
    assert_eq!(a_times, vec![0.0, 5.0, 10.0, 15.0, 20.0]);

    let b_times = times_of(&entries_for(&log, "B", "internal"));
    assert_eq!(b_times, vec![0.0, 3.0, 6.0, 9.0, 12.0, 15.0, 18.0]);
}

// ============================================================================
// A passive model woken by a connection
// ============================================================================

#[test]
fn test_passive_receiver_wakes_on_external_event() {
    let log: Log = Log::default();
    let mut registry = DynamicsRegistry::new();
    register_trace(
        &mut registry,
        "Source",
        &log,
        Time::new(5.0),
        Time::new(5.0),
        Some(("out".to_string(), serde_json::json!(42))),
    );
    register_trace(
        &mut registry,
        "Sink",
        &log,
        Time::INFINITY,
        Time::INFINITY,
        None,
    );

    let mut graph = ModelGraph::new("top");
    let root = graph.root();
    let a = graph
        .add_atomic(root, AtomicSpec::new("a", "Source").with_output("out"))
        .unwrap();
    let b = graph
        .add_atomic(root, AtomicSpec::new("b", "Sink").with_input("in"))
        .unwrap();
    graph
        .connect(root, ConnectionKind::Internal, a, "out", b, "in")
        .unwrap();

    let mut coordinator = Coordinator::new(graph, registry, Box::new(NoopObserver));
    coordinator.load().unwrap();
    coordinator.init(Time::ZERO).unwrap();

    // Before the first event, the receiver is scheduled at infinity.
    assert!(coordinator.simulator(b).unwrap().next_event_time().is_infinity());

    assert_eq!(coordinator.step().unwrap(), Some(Time::new(5.0)));

    let externals = entries_for(&log, "Sink", "external");
    assert_eq!(externals.len(), 1);
    assert_eq!(externals[0].time, 5.0);
    assert_eq!(externals[0].values, vec![serde_json::json!(42)]);

    // The source's internal transition fired in the same step.
    assert_eq!(times_of(&entries_for(&log, "Source", "internal")), vec![5.0]);
}

// ============================================================================
// Simultaneous internal and external resolve to one confluent call
// ============================================================================

#[test]
fn test_simultaneous_arrival_is_confluent_once() {
    let log: Log = Log::default();
    let mut registry = DynamicsRegistry::new();
    register_trace(
        &mut registry,
        "Pulse",
        &log,
        Time::new(10.0),
        Time::INFINITY,
        Some(("out".to_string(), serde_json::json!("ping"))),
    );
    register_trace(
        &mut registry,
        "Clash",
        &log,
        Time::new(10.0),
        Time::INFINITY,
        None,
    );

    let mut graph = ModelGraph::new("top");
    let root = graph.root();
    let s = graph
        .add_atomic(root, AtomicSpec::new("s", "Pulse").with_output("out"))
        .unwrap();
    let c = graph
        .add_atomic(root, AtomicSpec::new("c", "Clash").with_input("in"))
        .unwrap();
    graph
        .connect(root, ConnectionKind::Internal, s, "out", c, "in")
        .unwrap();

    let mut coordinator = Coordinator::new(graph, registry, Box::new(NoopObserver));
    coordinator.load().unwrap();
    coordinator.init(Time::ZERO).unwrap();
    assert_eq!(coordinator.step().unwrap(), Some(Time::new(10.0)));

    let confluent = entries_for(&log, "Clash", "confluent");
    assert_eq!(confluent.len(), 1);
    assert_eq!(confluent[0].time, 10.0);
    assert_eq!(confluent[0].values, vec![serde_json::json!("ping")]);

    // Neither half fired as a separate call.
    assert!(entries_for(&log, "Clash", "internal").is_empty());
    assert!(entries_for(&log, "Clash", "external").is_empty());
    assert_eq!(coordinator.stats().confluent_transitions, 1);
}

// ============================================================================
// Event conservation: fan-out and fan-in
// ============================================================================

#[test]
fn test_fan_out_and_fan_in_conserve_events() {
    let log: Log = Log::default();
    let mut registry = DynamicsRegistry::new();
    register_trace(
        &mut registry,
        "S1",
        &log,
        Time::new(3.0),
        Time::INFINITY,
        Some(("out".to_string(), serde_json::json!("s1"))),
    );
    register_trace(
        &mut registry,
        "S2",
        &log,
        Time::new(3.0),
        Time::INFINITY,
        Some(("out".to_string(), serde_json::json!("s2"))),
    );
    register_trace(&mut registry, "D1", &log, Time::INFINITY, Time::INFINITY, None);
    register_trace(&mut registry, "D2", &log, Time::INFINITY, Time::INFINITY, None);

    let mut graph = ModelGraph::new("top");
    let root = graph.root();
    let s1 = graph
        .add_atomic(root, AtomicSpec::new("s1", "S1").with_output("out"))
        .unwrap();
    let s2 = graph
        .add_atomic(root, AtomicSpec::new("s2", "S2").with_output("out"))
        .unwrap();
    let d1 = graph
        .add_atomic(root, AtomicSpec::new("d1", "D1").with_input("in"))
        .unwrap();
    let d2 = graph
        .add_atomic(root, AtomicSpec::new("d2", "D2").with_input("in"))
        .unwrap();
    // s1 fans out to both destinations; s2 fans in on d1.
    graph
        .connect(root, ConnectionKind::Internal, s1, "out", d1, "in")
        .unwrap();
    graph
        .connect(root, ConnectionKind::Internal, s1, "out", d2, "in")
        .unwrap();
    graph
        .connect(root, ConnectionKind::Internal, s2, "out", d1, "in")
        .unwrap();

    let mut coordinator = Coordinator::new(graph, registry, Box::new(NoopObserver));
    coordinator.load().unwrap();
    coordinator.init(Time::ZERO).unwrap();
    assert_eq!(coordinator.step().unwrap(), Some(Time::new(3.0)));

    // d1 received both simultaneous events as one batched call.
    let d1_externals = entries_for(&log, "D1", "external");
    assert_eq!(d1_externals.len(), 1);
    assert_eq!(
        d1_externals[0].values,
        vec![serde_json::json!("s1"), serde_json::json!("s2")]
    );

    // d2 received exactly the fanned-out copy.
    let d2_externals = entries_for(&log, "D2", "external");
    assert_eq!(d2_externals.len(), 1);
    assert_eq!(d2_externals[0].values, vec![serde_json::json!("s1")]);

    assert_eq!(coordinator.stats().events_routed, 3);
    assert_eq!(coordinator.stats().external_transitions, 2);
}

// ============================================================================
// Failure semantics
// ============================================================================

#[test]
fn test_dynamics_error_aborts_the_step() {
    struct Failing;
    impl Dynamics for Failing {
        fn init(&mut self, _time: Time) -> SimResult<Time> {
            Ok(Time::new(1.0))
        }
        fn internal_transition(&mut self, _time: Time) -> SimResult<()> {
            Err(SimError::dynamics("negative capacity"))
        }
        fn time_advance(&self) -> Time {
            Time::new(1.0)
        }
    }

    let mut registry = DynamicsRegistry::new();
    registry.register("Failing", |_, _| Box::new(Failing));

    let mut graph = ModelGraph::new("top");
    let root = graph.root();
    graph.add_atomic(root, AtomicSpec::new("f", "Failing")).unwrap();

    let mut coordinator = Coordinator::new(graph, registry, Box::new(NoopObserver));
    coordinator.load().unwrap();
    coordinator.init(Time::ZERO).unwrap();
    let err = coordinator.step().unwrap_err();
    assert!(matches!(err, SimError::Dynamics(_)));
}

#[test]
fn test_no_transition_after_finish() {
    let log: Log = Log::default();
    let mut registry = DynamicsRegistry::new();
    register_trace(&mut registry, "A", &log, Time::ZERO, Time::new(5.0), None);

    let mut graph = ModelGraph::new("top");
    let root = graph.root();
    graph.add_atomic(root, AtomicSpec::new("a", "A")).unwrap();

    let mut coordinator = Coordinator::new(graph, registry, Box::new(NoopObserver));
    coordinator.load().unwrap();
    coordinator.init(Time::ZERO).unwrap();
    coordinator.step().unwrap();
    coordinator.finish().unwrap();

    // The schedule still holds an entry, but the simulator refuses to fire.
    let err = coordinator.step().unwrap_err();
    assert!(matches!(err, SimError::Lifecycle { .. }));
}

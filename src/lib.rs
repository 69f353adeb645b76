//! # Devsim Simulation Kernel
//!
//! A multi-modeling and simulation kernel implementing the Discrete Event
//! System Specification (DEVS) formalism: hierarchical models built from
//! atomic behaviors and coupled containers, driven through simulated time
//! by a deterministic event scheduler and coordinator.
//!
//! ## Design Principles
//!
//! - **Strict DEVS semantics**: internal, external and confluent
//!   transitions are kept separate; all simulators tied at the minimum
//!   next-event time are handled in one global step.
//! - **Deterministic scheduling**: tie-break grouping uses exact time
//!   equality and a stable extraction order, so identical runs produce
//!   identical trajectories.
//! - **Deferred structural change**: executive models request graph
//!   mutations through a queue the coordinator replays between steps; the
//!   scheduler and the model graph never disagree mid-step.
//! - **Injected boundaries**: dynamics implementations come from a
//!   registry, observations go to an observer capability; the kernel parses
//!   no file formats and owns no output sinks.
//!
//! ## Quick Start
//!
//! ```rust
//! use devsim::{AtomicSpec, ConnectionKind, ModelGraph, RootCoordinator, Time};
//! use devsim::observer::MemoryObserver;
//! use devsim::registry::create_default_registry;
//!
//! // A generator firing every 5 time units into a passive store.
//! let mut graph = ModelGraph::new("top");
//! let root = graph.root();
//! let gen = graph
//!     .add_atomic(
//!         root,
//!         AtomicSpec::new("gen", "Generator")
//!             .with_output("out")
//!             .with_condition("period", serde_json::json!(5.0)),
//!     )
//!     .unwrap();
//! let sink = graph
//!     .add_atomic(root, AtomicSpec::new("sink", "Storage").with_input("in"))
//!     .unwrap();
//! graph
//!     .connect(root, ConnectionKind::Internal, gen, "out", sink, "in")
//!     .unwrap();
//!
//! let mut driver = RootCoordinator::new().with_end(Time::new(20.0));
//! driver
//!     .load(graph, create_default_registry(), Box::new(MemoryObserver::new()))
//!     .unwrap();
//! driver.init().unwrap();
//! while driver.run().unwrap() {}
//! driver.finish().unwrap();
//!
//! assert_eq!(driver.current_time(), Time::new(20.0));
//! ```
//!
//! ## Configuration-Driven Setup
//!
//! ```rust,ignore
//! use devsim::config::SimConfig;
//!
//! let config = SimConfig::from_file("experiment.yaml")?;
//! let mut driver = config.build_root(registry, observer)?;
//! ```

pub mod config;
pub mod coordinator;
pub mod dynamics;
pub mod error;
pub mod event;
pub mod graph;
pub mod models;
pub mod observer;
pub mod registry;
pub mod root;
pub mod scheduler;
pub mod simulator;
pub mod time;

// Re-export commonly used types
pub use config::{ConfigError, ConfigResult, SimConfig};
pub use coordinator::{Coordinator, CoordinatorStats};
pub use dynamics::{Dynamics, ModelContext, StructuralRequest};
pub use error::{SimError, SimResult};
pub use event::ExternalEvent;
pub use graph::{
    AtomicSpec, Conditions, Connection, ConnectionKind, CoupledSpec, ModelGraph, ModelId,
};
pub use observer::{MemoryObserver, NoopObserver, ObservationRecord, Observer};
pub use registry::{create_default_registry, DynamicsRegistry};
pub use root::RootCoordinator;
pub use scheduler::EventTable;
pub use simulator::{Phase, Simulator};
pub use time::Time;

/// Initialize the tracing subscriber for logging.
///
/// Call this at the start of your program to enable logging.
///
/// # Example
///
/// ```rust,ignore
/// devsim::init_logging("info");
/// ```
pub fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

//! The behavior contract implemented by every atomic model.
//!
//! A [`Dynamics`] implementation is a local state machine driven by the
//! coordinator through three transition kinds:
//!
//! - **internal**: the model's own scheduled time was reached and no input
//!   arrived at the same instant,
//! - **external**: input events arrived strictly before the scheduled time,
//! - **confluent**: input events arrived exactly at the scheduled time.
//!
//! `output` and `time_advance` take `&self`: they are pure projections of
//! the current state and must not mutate it. The default confluent policy
//! runs the internal transition first, then the external one; models that
//! need a different precedence override `confluent_transition`.
//!
//! Executive models request structural changes (spawn or remove models,
//! rewire connections) by returning [`StructuralRequest`]s from
//! `structural_requests`. The coordinator drains that queue after each
//! transition and applies the requests at the fixed point between steps —
//! dynamics never touch the model graph directly.

use crate::error::SimResult;
use crate::event::ExternalEvent;
use crate::graph::{AtomicSpec, ConnectionKind, CoupledSpec, ModelId};
use crate::time::Time;

/// Identity handed to a dynamics implementation at instantiation.
#[derive(Clone, Debug)]
pub struct ModelContext {
    /// The atomic model this dynamics drives.
    pub model: ModelId,
    /// The model's name within its parent.
    pub name: String,
    /// The parent coupled model. `None` only for a model attached directly
    /// under a detached root, which does not happen in practice.
    pub parent: Option<ModelId>,
}

/// A deferred structural-change intent issued by an executive model.
///
/// Models created or referenced by a request are addressed by name inside
/// an existing coupled model, because the requester cannot know the id a
/// model will receive before the request is applied. `src`/`dst` set to
/// `None` designate the parent coupled model itself (for the `Input` and
/// `Output` connection kinds).
#[derive(Clone, Debug)]
pub enum StructuralRequest {
    /// Create an atomic model under `parent`; its dynamics is resolved
    /// through the coordinator's registry and initialized at the current
    /// step time.
    AddAtomic { parent: ModelId, spec: AtomicSpec },
    /// Create an empty coupled model under `parent`.
    AddCoupled { parent: ModelId, spec: CoupledSpec },
    /// Remove the named child of `parent` and its whole subtree.
    RemoveModel { parent: ModelId, name: String },
    /// Add a connection inside `parent`.
    Connect {
        parent: ModelId,
        kind: ConnectionKind,
        src: Option<String>,
        src_port: String,
        dst: Option<String>,
        dst_port: String,
    },
    /// Remove a connection inside `parent`.
    Disconnect {
        parent: ModelId,
        kind: ConnectionKind,
        src: Option<String>,
        src_port: String,
        dst: Option<String>,
        dst_port: String,
    },
}

/// The seven-operation behavior contract of an atomic model.
///
/// All methods have conservative defaults so that a passive model (one that
/// never fires spontaneously and ignores its inputs) is the empty impl.
pub trait Dynamics: Send {
    /// Called exactly once before the first `time_advance` query.
    ///
    /// Returns the delay until the first internal event, relative to `time`;
    /// [`Time::INFINITY`] starts the model passive.
    fn init(&mut self, _time: Time) -> SimResult<Time> {
        Ok(Time::INFINITY)
    }

    /// Produces the events emitted immediately before an internal or
    /// confluent transition. Pure projection of the current state.
    fn output(&self, _time: Time) -> SimResult<Vec<ExternalEvent>> {
        Ok(Vec::new())
    }

    /// The model's own scheduled time was reached with no simultaneous input.
    fn internal_transition(&mut self, _time: Time) -> SimResult<()> {
        Ok(())
    }

    /// Input events arrived before the model's scheduled time.
    fn external_transition(&mut self, _events: &[ExternalEvent], _time: Time) -> SimResult<()> {
        Ok(())
    }

    /// Input events arrived exactly at the model's scheduled time.
    ///
    /// Default policy: internal transition first, then external.
    fn confluent_transition(&mut self, time: Time, events: &[ExternalEvent]) -> SimResult<()> {
        self.internal_transition(time)?;
        self.external_transition(events, time)
    }

    /// The delay until the next internal event, relative to the time of the
    /// most recent transition. [`Time::INFINITY`] means "never fire
    /// spontaneously".
    fn time_advance(&self) -> Time {
        Time::INFINITY
    }

    /// Read-only observation query for the named observation port.
    /// Must not mutate state.
    fn observation(&self, _port: &str) -> Option<serde_json::Value> {
        None
    }

    /// Terminal hook invoked once when the run finishes, before the model
    /// becomes unable to transition.
    fn finish(&mut self, _time: Time) {}

    /// Drains the structural-change intents accumulated since the last
    /// transition. Only executive models return anything here.
    fn structural_requests(&mut self) -> Vec<StructuralRequest> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A model that counts which transitions fired, to pin down the default
    /// confluent ordering.
    #[derive(Default)]
    struct OrderProbe {
        calls: Vec<&'static str>,
    }

    impl Dynamics for OrderProbe {
        fn internal_transition(&mut self, _time: Time) -> SimResult<()> {
            self.calls.push("internal");
            Ok(())
        }

        fn external_transition(&mut self, _events: &[ExternalEvent], _time: Time) -> SimResult<()> {
            self.calls.push("external");
            Ok(())
        }
    }

    #[test]
    fn test_default_confluent_order_is_internal_then_external() {
        let mut probe = OrderProbe::default();
        let events = vec![ExternalEvent::signal("in")];
        probe.confluent_transition(Time::new(3.0), &events).unwrap();
        assert_eq!(probe.calls, vec!["internal", "external"]);
    }

    #[test]
    fn test_passive_defaults() {
        struct Passive;
        impl Dynamics for Passive {}

        let mut passive = Passive;
        assert_eq!(passive.init(Time::ZERO).unwrap(), Time::INFINITY);
        assert_eq!(passive.time_advance(), Time::INFINITY);
        assert!(passive.output(Time::ZERO).unwrap().is_empty());
        assert!(passive.observation("anything").is_none());
        assert!(passive.structural_requests().is_empty());
    }
}

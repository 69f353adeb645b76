//! Dynamics factory registry.
//!
//! An atomic model carries a dynamics identifier, not code; the registry
//! maps that identifier to a factory closure producing a boxed [`Dynamics`]
//! instance. How an identifier came to be registered (compiled-in behavior,
//! plugin shim, test double) is outside the kernel's concern.
//!
//! # Example
//!
//! ```
//! use devsim::registry::DynamicsRegistry;
//! use devsim::dynamics::Dynamics;
//!
//! struct Quiet;
//! impl Dynamics for Quiet {}
//!
//! let mut registry = DynamicsRegistry::new();
//! registry.register("Quiet", |_ctx, _conditions| Box::new(Quiet));
//! assert!(registry.contains("Quiet"));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::dynamics::{Dynamics, ModelContext};
use crate::error::{SimError, SimResult};
use crate::graph::Conditions;

/// Type alias for dynamics factory functions.
pub type DynamicsFactory =
    Arc<dyn Fn(&ModelContext, &Conditions) -> Box<dyn Dynamics> + Send + Sync>;

/// A registry of dynamics factories keyed by identifier.
#[derive(Default)]
pub struct DynamicsRegistry {
    factories: HashMap<String, DynamicsFactory>,
}

impl DynamicsRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under the given identifier.
    ///
    /// Registering the same identifier twice replaces the previous factory.
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn(&ModelContext, &Conditions) -> Box<dyn Dynamics> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Arc::new(factory));
    }

    /// Instantiates the dynamics registered under `id`.
    ///
    /// Fails with [`SimError::UnknownDynamics`] when no factory is
    /// registered for the identifier.
    pub fn instantiate(
        &self,
        id: &str,
        ctx: &ModelContext,
        conditions: &Conditions,
    ) -> SimResult<Box<dyn Dynamics>> {
        self.factories
            .get(id)
            .map(|f| f(ctx, conditions))
            .ok_or_else(|| SimError::UnknownDynamics(id.to_string()))
    }

    /// Returns `true` if a factory is registered under `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Returns the number of registered identifiers.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns `true` if no factory is registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Returns an iterator over registered identifiers.
    pub fn dynamics_names(&self) -> impl Iterator<Item = &String> {
        self.factories.keys()
    }

    /// Unregisters an identifier. Returns `true` if it was present.
    pub fn unregister(&mut self, id: &str) -> bool {
        self.factories.remove(id).is_some()
    }
}

impl std::fmt::Debug for DynamicsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicsRegistry")
            .field("registered", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Creates a registry with the built-in model library.
///
/// Includes:
/// - `Generator` — periodic event source
/// - `Processor` — single-server queue with a fixed service time
/// - `Storage` — passive accumulator
pub fn create_default_registry() -> DynamicsRegistry {
    use crate::models::{Generator, Processor, Storage};

    let mut registry = DynamicsRegistry::new();
    registry.register("Generator", |_ctx, conditions| {
        Box::new(Generator::from_conditions(conditions))
    });
    registry.register("Processor", |_ctx, conditions| {
        Box::new(Processor::from_conditions(conditions))
    });
    registry.register("Storage", |_ctx, _conditions| Box::new(Storage::new()));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Time;

    struct Idle;
    impl Dynamics for Idle {}

    fn ctx() -> ModelContext {
        ModelContext {
            model: 1,
            name: "m".to_string(),
            parent: Some(0),
        }
    }

    #[test]
    fn test_register_and_instantiate() {
        let mut registry = DynamicsRegistry::new();
        assert!(registry.is_empty());

        registry.register("Idle", |_, _| Box::new(Idle));
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("Idle"));

        let mut dynamics = registry.instantiate("Idle", &ctx(), &Conditions::new()).unwrap();
        assert_eq!(dynamics.init(Time::ZERO).unwrap(), Time::INFINITY);
    }

    #[test]
    fn test_unknown_dynamics() {
        let registry = DynamicsRegistry::new();
        let err = match registry.instantiate("Nope", &ctx(), &Conditions::new()) {
            Ok(_) => panic!("expected instantiate to fail"),
            Err(e) => e,
        };
        assert!(matches!(err, SimError::UnknownDynamics(_)));
    }

    #[test]
    fn test_factory_receives_conditions() {
        struct Delayed {
            delay: f64,
        }
        impl Dynamics for Delayed {
            fn init(&mut self, _time: Time) -> SimResult<Time> {
                Ok(Time::new(self.delay))
            }
        }

        let mut registry = DynamicsRegistry::new();
        registry.register("Delayed", |_, conditions| {
            let delay = conditions
                .get("delay")
                .and_then(serde_json::Value::as_f64)
                .unwrap_or(1.0);
            Box::new(Delayed { delay })
        });

        let mut conditions = Conditions::new();
        conditions.insert("delay".to_string(), serde_json::json!(7.5));
        let mut dynamics = registry.instantiate("Delayed", &ctx(), &conditions).unwrap();
        assert_eq!(dynamics.init(Time::ZERO).unwrap(), Time::new(7.5));
    }

    #[test]
    fn test_default_registry() {
        let registry = create_default_registry();
        assert!(registry.contains("Generator"));
        assert!(registry.contains("Processor"));
        assert!(registry.contains("Storage"));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_unregister() {
        let mut registry = DynamicsRegistry::new();
        registry.register("Idle", |_, _| Box::new(Idle));
        assert!(registry.unregister("Idle"));
        assert!(!registry.contains("Idle"));
        assert!(!registry.unregister("Idle"));
    }
}

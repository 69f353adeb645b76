//! Error types for the simulation kernel.
//!
//! Every fallible public API returns [`SimResult`]. The kernel performs no
//! local recovery or retry: any error aborts the current run, leaving the
//! model graph and scheduler in their state from before the failing step.

use thiserror::Error;

/// Errors raised by the simulation kernel.
#[derive(Error, Debug)]
pub enum SimError {
    /// A sibling model with the same name already exists.
    #[error("duplicate model name '{name}' in coupled model '{parent}'")]
    DuplicateName { parent: String, name: String },

    /// A port with the same name already exists on the model.
    #[error("duplicate {direction} port '{port}' on model '{model}'")]
    DuplicatePort {
        model: String,
        direction: &'static str,
        port: String,
    },

    /// A model was referenced but does not exist.
    #[error("model '{0}' not found")]
    ModelNotFound(String),

    /// A container operation targeted an atomic model.
    #[error("model '{0}' is not a coupled model")]
    NotACoupledModel(String),

    /// A port was referenced but does not exist on the model.
    #[error("{direction} port '{port}' not found on model '{model}'")]
    PortNotFound {
        model: String,
        direction: &'static str,
        port: String,
    },

    /// A connection was referenced but does not exist.
    #[error("no connection {src}:{src_port} -> {dst}:{dst_port} in coupled model '{parent}'")]
    ConnectionNotFound {
        parent: String,
        src: String,
        src_port: String,
        dst: String,
        dst_port: String,
    },

    /// A connection's endpoints violate the kind-specific constraints.
    #[error("invalid connection: {0}")]
    InvalidConnection(String),

    /// Illegal use of infinity in time arithmetic.
    #[error("invalid time arithmetic: {0}")]
    InvalidTimeArithmetic(String),

    /// A transition was requested on a simulator outside the `Idle` phase.
    #[error("lifecycle violation on model '{model}': {operation} while {phase}")]
    Lifecycle {
        model: String,
        operation: &'static str,
        phase: &'static str,
    },

    /// An output event was addressed to a nonexistent port.
    #[error("routing failure: model '{model}' emitted on unknown output port '{port}'")]
    Routing { model: String, port: String },

    /// No factory is registered for the requested dynamics identifier.
    #[error("unknown dynamics '{0}'")]
    UnknownDynamics(String),

    /// A domain error raised inside a dynamics implementation.
    ///
    /// The kernel does not interpret these; they propagate unchanged to
    /// whatever drove the run.
    #[error("dynamics error: {0}")]
    Dynamics(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SimError {
    /// Wraps a model-specific domain error for propagation through the kernel.
    pub fn dynamics(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        SimError::Dynamics(err.into())
    }
}

/// Result type for kernel operations.
pub type SimResult<T> = Result<T, SimError>;

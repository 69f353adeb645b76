//! External events exchanged between atomic models.
//!
//! An [`ExternalEvent`] is produced by a model's `output` call and consumed
//! by the destination models' external (or confluent) transitions. Events
//! carry the port name they travel on and an opaque payload; they do not
//! carry a timestamp, because delivery is always synchronous at the current
//! step time.

use serde::{Deserialize, Serialize};

/// A message travelling along a port connection.
///
/// On the producing side `port` names the source model's output port; after
/// routing, `port` names the destination model's input port. The payload is
/// an arbitrary structured value the kernel never interprets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExternalEvent {
    /// The port this event travels on.
    pub port: String,
    /// The opaque payload.
    pub value: serde_json::Value,
}

impl ExternalEvent {
    /// Creates a new event on the given port.
    pub fn new(port: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            port: port.into(),
            value,
        }
    }

    /// Creates an event with an empty (null) payload, for pure signalling.
    pub fn signal(port: impl Into<String>) -> Self {
        Self::new(port, serde_json::Value::Null)
    }
}

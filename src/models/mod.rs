//! Built-in atomic model behaviors.
//!
//! A small stock library covering the common building blocks of
//! discrete-event experiments:
//!
//! - [`Generator`] — emits an event on its output port at a fixed period
//! - [`Processor`] — single-server queue with a fixed service time
//! - [`Storage`] — passive accumulator that only reacts to input
//!
//! All three are registered by name in
//! [`create_default_registry`](crate::registry::create_default_registry)
//! and configured through their condition sets.

pub mod generator;
pub mod processor;
pub mod storage;

pub use generator::Generator;
pub use processor::Processor;
pub use storage::Storage;

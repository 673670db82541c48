//! Guarded call execution.
//!
//! The [`GuardedExecutor`] runs one logical call through the circuit
//! breaker gate and, if admitted, through the retry loop, classifying every
//! attempt and reporting to the observer along the way.

mod guarded;

pub use guarded::{GuardedExecutor, GuardedExecutorBuilder};

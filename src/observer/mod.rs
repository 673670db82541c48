//! Structured event observation.
//!
//! Breakers and executors report what they do to an [`EventObserver`]
//! supplied by the caller; nothing is accumulated in global state. The
//! caller picks the sinks:
//!
//! - [`TracingObserver`] logs every event through `tracing`.
//! - [`MetricsRecorder`] aggregates per-endpoint counts and the transition
//!   history, and can persist them as JSON.
//! - [`FanoutObserver`] forwards to several observers at once.

mod events;
mod observers;
mod recorder;

pub use events::{CallSummary, StateTransitionEvent};
pub use observers::{EventObserver, FanoutObserver, NoopObserver, TracingObserver};
pub use recorder::{EndpointMetrics, MetricsRecorder, MetricsReport};

pub(crate) use observers::dispatch;

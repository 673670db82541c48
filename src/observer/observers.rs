//! The observer trait and the built-in observers.

use crate::core::AttemptRecord;
use crate::observer::events::{CallSummary, StateTransitionEvent};

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Receives structured notifications from breakers and executors.
///
/// Observers own their sinks. They must not panic; if one does, the panic
/// is caught, logged, and the protected call carries on.
pub trait EventObserver: Send + Sync {
    /// A circuit breaker changed state.
    ///
    /// Events are stamped while the breaker lock is held but delivered after
    /// it is released, so concurrent transitions can arrive out of order.
    /// Order by [`StateTransitionEvent::timestamp`], not arrival.
    fn on_state_transition(&self, event: &StateTransitionEvent);

    /// An attempt finished.
    fn on_attempt(&self, record: &AttemptRecord, endpoint: &str);

    /// A guarded call finished.
    fn on_call_complete(&self, _summary: &CallSummary) {}
}

/// Runs an observer hook, containing any panic it raises.
pub(crate) fn dispatch<F>(observer: &dyn EventObserver, hook: &'static str, f: F)
where
    F: FnOnce(&dyn EventObserver),
{
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| f(observer))) {
        tracing::warn!(
            hook = hook,
            panic = %panic_message(payload.as_ref()),
            "Event observer panicked, continuing"
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// An observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl EventObserver for NoopObserver {
    fn on_state_transition(&self, _event: &StateTransitionEvent) {}

    fn on_attempt(&self, _record: &AttemptRecord, _endpoint: &str) {}
}

/// Emits every event as a structured `tracing` event.
///
/// Events use the `callguard::events` target so a subscriber can route them
/// to a dedicated sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl EventObserver for TracingObserver {
    fn on_state_transition(&self, event: &StateTransitionEvent) {
        tracing::info!(
            target: "callguard::events",
            event_type = "state_transition",
            endpoint = %event.endpoint,
            from = %event.from,
            to = %event.to,
            consecutive_failures = event.consecutive_failures,
            timestamp = %event.timestamp.to_rfc3339(),
            "Circuit breaker state changed from {} to {}",
            event.from,
            event.to
        );
    }

    fn on_attempt(&self, record: &AttemptRecord, endpoint: &str) {
        if record.outcome.is_success() {
            tracing::debug!(
                target: "callguard::events",
                event_type = "attempt",
                endpoint = %endpoint,
                attempt = record.attempt,
                outcome = %record.outcome,
                elapsed_ms = record.elapsed.as_millis() as u64,
                waited_ms = record.waited_before.as_millis() as u64,
                "Attempt succeeded"
            );
        } else {
            tracing::info!(
                target: "callguard::events",
                event_type = "attempt",
                endpoint = %endpoint,
                attempt = record.attempt,
                outcome = %record.outcome,
                elapsed_ms = record.elapsed.as_millis() as u64,
                waited_ms = record.waited_before.as_millis() as u64,
                error = ?record.error,
                "Attempt failed"
            );
        }
    }

    fn on_call_complete(&self, summary: &CallSummary) {
        match summary.error_kind {
            None => tracing::info!(
                target: "callguard::events",
                event_type = "call_complete",
                call_id = %summary.call_id,
                endpoint = %summary.endpoint,
                attempts = summary.attempts,
                duration_ms = summary.duration.as_millis() as u64,
                "Call succeeded"
            ),
            Some(kind) => tracing::warn!(
                target: "callguard::events",
                event_type = "call_complete",
                call_id = %summary.call_id,
                endpoint = %summary.endpoint,
                error_kind = %kind,
                error = ?summary.error,
                attempts = summary.attempts,
                permitted = summary.permitted,
                duration_ms = summary.duration.as_millis() as u64,
                "Call failed"
            ),
        }
    }
}

/// Forwards every event to each of its observers in order.
#[derive(Default, Clone)]
pub struct FanoutObserver {
    observers: Vec<Arc<dyn EventObserver>>,
}

impl FanoutObserver {
    /// Creates an empty fan-out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an observer.
    pub fn with(mut self, observer: Arc<dyn EventObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Returns the number of observers.
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Returns `true` if there are no observers.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl std::fmt::Debug for FanoutObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutObserver")
            .field("observers", &self.observers.len())
            .finish()
    }
}

// Each child is dispatched separately so one panicking sink does not
// starve the ones after it.
impl EventObserver for FanoutObserver {
    fn on_state_transition(&self, event: &StateTransitionEvent) {
        for observer in &self.observers {
            dispatch(observer.as_ref(), "on_state_transition", |o| {
                o.on_state_transition(event)
            });
        }
    }

    fn on_attempt(&self, record: &AttemptRecord, endpoint: &str) {
        for observer in &self.observers {
            dispatch(observer.as_ref(), "on_attempt", |o| {
                o.on_attempt(record, endpoint)
            });
        }
    }

    fn on_call_complete(&self, summary: &CallSummary) {
        for observer in &self.observers {
            dispatch(observer.as_ref(), "on_call_complete", |o| {
                o.on_call_complete(summary)
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitState;
    use crate::core::Outcome;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Counting {
        transitions: AtomicUsize,
        attempts: AtomicUsize,
    }

    impl EventObserver for Counting {
        fn on_state_transition(&self, _event: &StateTransitionEvent) {
            self.transitions.fetch_add(1, Ordering::SeqCst);
        }

        fn on_attempt(&self, _record: &AttemptRecord, _endpoint: &str) {
            self.attempts.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Panicking;

    impl EventObserver for Panicking {
        fn on_state_transition(&self, _event: &StateTransitionEvent) {
            panic!("sink unavailable");
        }

        fn on_attempt(&self, _record: &AttemptRecord, _endpoint: &str) {
            panic!("sink unavailable");
        }
    }

    fn record() -> AttemptRecord {
        AttemptRecord::new(1, Outcome::Success, Duration::from_millis(3), Duration::ZERO)
    }

    #[test]
    fn test_dispatch_contains_panics() {
        let observer = Panicking;
        dispatch(&observer, "on_attempt", |o| o.on_attempt(&record(), "/slow"));
    }

    #[test]
    fn test_fanout_continues_past_panicking_observer() {
        let counting = Arc::new(Counting::default());
        let fanout = FanoutObserver::new()
            .with(Arc::new(Panicking))
            .with(counting.clone());

        assert_eq!(fanout.len(), 2);

        fanout.on_attempt(&record(), "/slow");
        fanout.on_state_transition(&StateTransitionEvent::new(
            "/slow",
            CircuitState::Closed,
            CircuitState::Open,
            3,
        ));

        assert_eq!(counting.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(counting.transitions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}

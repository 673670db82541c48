//! Circuit breaker implementation.

use crate::circuit_breaker::config::BreakerConfig;
use crate::circuit_breaker::state::{BreakerMetrics, BreakerRuntime, CircuitState};
use crate::core::ConfigResult;
use crate::observer::{dispatch, EventObserver, NoopObserver, StateTransitionEvent};

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// A circuit breaker guarding one remote endpoint.
///
/// The breaker is shared (usually behind an [`Arc`]) by every call routed to
/// its endpoint. It only gates and records; it never invokes the remote
/// itself.
///
/// # States
///
/// - **Closed**: Calls pass through, consecutive failures are counted.
/// - **Open**: Calls are rejected until `reset_timeout` has elapsed.
/// - **Half-Open**: Calls are admitted as probes. The first recorded success
///   closes the circuit; the first recorded failure reopens it.
///
/// The cool-down is evaluated lazily in [`allow_attempt`](Self::allow_attempt);
/// there is no background timer, so a breaker nobody calls never changes
/// state.
///
/// Every concurrent caller that reaches a half-open breaker is admitted, so
/// a short burst of probes can reach the remote before the first failure
/// reopens the circuit.
///
/// # Example
///
/// ```rust
/// use callguard::circuit_breaker::{BreakerConfig, CircuitBreaker, CircuitState};
///
/// let breaker = CircuitBreaker::new("/unreliable", BreakerConfig::default()).unwrap();
///
/// for _ in 0..3 {
///     assert!(breaker.allow_attempt());
///     breaker.record_failure();
/// }
///
/// assert_eq!(breaker.state(), CircuitState::Open);
/// assert!(!breaker.allow_attempt());
/// ```
pub struct CircuitBreaker {
    /// The protected endpoint.
    endpoint: String,
    /// Configuration.
    config: BreakerConfig,
    /// Runtime state and counters, mutated only under this lock.
    inner: Mutex<Inner>,
    /// Receives state transitions.
    observer: Arc<dyn EventObserver>,
}

#[derive(Debug, Default)]
struct Inner {
    runtime: BreakerRuntime,
    metrics: BreakerMetrics,
}

impl Inner {
    fn transition(
        &mut self,
        endpoint: &str,
        to: CircuitState,
        now: Instant,
    ) -> StateTransitionEvent {
        let event = StateTransitionEvent::new(
            endpoint,
            self.runtime.state,
            to,
            self.runtime.consecutive_failures,
        );

        match to {
            CircuitState::Open => {
                self.runtime.opened_at = Some(now);
                self.metrics.times_opened += 1;
            }
            CircuitState::HalfOpen => {
                self.runtime.opened_at = None;
                self.runtime.consecutive_failures = 0;
            }
            CircuitState::Closed => {
                if self.runtime.state == CircuitState::HalfOpen {
                    self.metrics.times_closed += 1;
                }
                self.runtime.opened_at = None;
                self.runtime.consecutive_failures = 0;
            }
        }
        self.runtime.state = to;

        event
    }
}

impl CircuitBreaker {
    /// Creates a breaker for `endpoint`, rejecting invalid configuration.
    pub fn new(endpoint: impl Into<String>, config: BreakerConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            endpoint: endpoint.into(),
            config,
            inner: Mutex::new(Inner::default()),
            observer: Arc::new(NoopObserver),
        })
    }

    /// Creates a breaker with the default configuration.
    pub fn with_defaults(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            config: BreakerConfig::default(),
            inner: Mutex::new(Inner::default()),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Sets the observer that receives state transitions.
    pub fn with_observer(mut self, observer: Arc<dyn EventObserver>) -> Self {
        self.observer = observer;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: StateTransitionEvent) {
        match event.to {
            CircuitState::Open => tracing::warn!(
                endpoint = %self.endpoint,
                from = %event.from,
                consecutive_failures = event.consecutive_failures,
                "Circuit breaker opened"
            ),
            _ => tracing::info!(
                endpoint = %self.endpoint,
                from = %event.from,
                to = %event.to,
                "Circuit breaker state changed"
            ),
        }

        dispatch(self.observer.as_ref(), "on_state_transition", |o| {
            o.on_state_transition(&event)
        });
    }

    /// Returns the protected endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Returns the current state.
    ///
    /// This does not evaluate the cool-down: an open breaker whose reset
    /// timeout has elapsed still reports `Open` until the next gate check.
    pub fn state(&self) -> CircuitState {
        self.lock().runtime.state
    }

    /// Returns the current consecutive-failure count.
    pub fn consecutive_failures(&self) -> u32 {
        self.lock().runtime.consecutive_failures
    }

    /// Returns when the circuit last opened, if it is open.
    pub fn opened_at(&self) -> Option<Instant> {
        self.lock().runtime.opened_at
    }

    /// Returns a copy of the runtime state.
    pub fn snapshot(&self) -> BreakerRuntime {
        self.lock().runtime
    }

    /// Returns a copy of the counters.
    pub fn metrics(&self) -> BreakerMetrics {
        self.lock().metrics.clone()
    }

    /// Time left before an open breaker admits a probe.
    ///
    /// Returns `None` unless the breaker is open.
    pub fn remaining_cooldown(&self) -> Option<Duration> {
        let runtime = self.snapshot();
        let opened_at = runtime.opened_at.filter(|_| runtime.is_open())?;
        let elapsed = Instant::now().saturating_duration_since(opened_at);
        Some(self.config.reset_timeout.saturating_sub(elapsed))
    }

    /// Gate check: decides whether a call may be attempted.
    ///
    /// Closed and half-open breakers always admit. An open breaker admits
    /// only once `reset_timeout` has elapsed since it opened, moving to
    /// half-open first.
    pub fn allow_attempt(&self) -> bool {
        let now = Instant::now();
        let (allowed, event) = {
            let mut inner = self.lock();
            let (allowed, event) = match inner.runtime.state {
                CircuitState::Closed | CircuitState::HalfOpen => (true, None),
                CircuitState::Open => {
                    let opened_at = inner.runtime.opened_at.unwrap_or(now);
                    if now.saturating_duration_since(opened_at) >= self.config.reset_timeout {
                        let event = inner.transition(&self.endpoint, CircuitState::HalfOpen, now);
                        (true, Some(event))
                    } else {
                        (false, None)
                    }
                }
            };

            if allowed {
                inner.metrics.permitted += 1;
            } else {
                inner.metrics.rejected += 1;
            }
            (allowed, event)
        };

        if let Some(event) = event {
            self.emit(event);
        }
        if !allowed {
            tracing::debug!(endpoint = %self.endpoint, "Circuit open, failing fast");
        }
        allowed
    }

    /// Records a successful attempt.
    ///
    /// Resets the consecutive-failure count; a half-open breaker closes.
    pub fn record_success(&self) {
        let event = {
            let mut inner = self.lock();
            inner.metrics.successes += 1;
            inner.runtime.consecutive_failures = 0;

            if inner.runtime.is_half_open() {
                Some(inner.transition(&self.endpoint, CircuitState::Closed, Instant::now()))
            } else {
                None
            }
        };

        if let Some(event) = event {
            self.emit(event);
        }
    }

    /// Records a failed attempt.
    ///
    /// A closed breaker opens when the count reaches the threshold; a
    /// half-open breaker reopens immediately and restarts its cool-down.
    pub fn record_failure(&self) {
        let event = {
            let mut inner = self.lock();
            inner.metrics.failures += 1;
            inner.runtime.consecutive_failures =
                inner.runtime.consecutive_failures.saturating_add(1);

            match inner.runtime.state {
                CircuitState::Closed
                    if inner.runtime.consecutive_failures >= self.config.failure_threshold =>
                {
                    Some(inner.transition(&self.endpoint, CircuitState::Open, Instant::now()))
                }
                CircuitState::HalfOpen => {
                    Some(inner.transition(&self.endpoint, CircuitState::Open, Instant::now()))
                }
                // Already open: a late result from a call admitted earlier.
                _ => None,
            }
        };

        if let Some(event) = event {
            self.emit(event);
        }
    }

    /// Forces the circuit open, restarting the cool-down.
    pub fn force_open(&self) {
        let event = {
            let mut inner = self.lock();
            let now = Instant::now();
            if inner.runtime.is_open() {
                inner.runtime.opened_at = Some(now);
                None
            } else {
                Some(inner.transition(&self.endpoint, CircuitState::Open, now))
            }
        };

        if let Some(event) = event {
            self.emit(event);
        }
    }

    /// Forces the circuit closed and clears the failure count.
    pub fn force_close(&self) {
        let event = {
            let mut inner = self.lock();
            if inner.runtime.is_closed() {
                inner.runtime.consecutive_failures = 0;
                None
            } else {
                Some(inner.transition(&self.endpoint, CircuitState::Closed, Instant::now()))
            }
        };

        if let Some(event) = event {
            self.emit(event);
        }
    }

    /// Closes the circuit and clears all counters.
    pub fn reset(&self) {
        self.force_close();
        self.lock().metrics = BreakerMetrics::new();
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("endpoint", &self.endpoint)
            .field("runtime", &self.snapshot())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AttemptRecord;
    use std::thread;

    #[derive(Default)]
    struct Transitions(Mutex<Vec<(CircuitState, CircuitState)>>);

    impl EventObserver for Transitions {
        fn on_state_transition(&self, event: &StateTransitionEvent) {
            self.0.lock().unwrap().push((event.from, event.to));
        }

        fn on_attempt(&self, _record: &AttemptRecord, _endpoint: &str) {}
    }

    fn breaker(threshold: u32, reset_secs: u64) -> CircuitBreaker {
        let config = BreakerConfig::new()
            .with_failure_threshold(threshold)
            .with_reset_timeout(Duration::from_secs(reset_secs));
        CircuitBreaker::new("/unreliable", config).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = BreakerConfig::new().with_failure_threshold(0);
        assert!(CircuitBreaker::new("/x", config).is_err());
    }

    #[test]
    fn test_closed_breaker_admits() {
        let breaker = CircuitBreaker::with_defaults("/unreliable");
        assert!(breaker.allow_attempt());
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.metrics().permitted, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_opens_at_threshold() {
        let breaker = breaker(3, 30);

        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.consecutive_failures(), 2);

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.opened_at(), Some(Instant::now()));
        assert_eq!(breaker.metrics().times_opened, 1);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let breaker = breaker(3, 30);

        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        assert_eq!(breaker.consecutive_failures(), 0);

        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_threshold_of_one_opens_on_first_failure() {
        let breaker = breaker(1, 30);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_breaker_rejects_until_timeout() {
        let breaker = breaker(1, 30);
        breaker.record_failure();

        for _ in 0..5 {
            assert!(!breaker.allow_attempt());
            tokio::time::advance(Duration::from_secs(5)).await;
        }
        // 25s elapsed
        assert!(!breaker.allow_attempt());
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.metrics().rejected, 6);
        assert_eq!(breaker.remaining_cooldown(), Some(Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transitions_to_half_open_exactly_at_timeout() {
        let breaker = breaker(1, 30);
        breaker.record_failure();

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(breaker.allow_attempt());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert_eq!(breaker.consecutive_failures(), 0);
        assert_eq!(breaker.opened_at(), None);
        assert_eq!(breaker.remaining_cooldown(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_state_change_without_calls() {
        let breaker = breaker(1, 30);
        breaker.record_failure();

        tokio::time::advance(Duration::from_secs(120)).await;
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens_and_restarts_cooldown() {
        let breaker = breaker(3, 30);
        for _ in 0..3 {
            breaker.record_failure();
        }
        let start = Instant::now();

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(breaker.allow_attempt());
        breaker.record_failure();

        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.opened_at(), Some(start + Duration::from_secs(31)));
        assert!(!breaker.allow_attempt());
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_success_closes() {
        let breaker = breaker(2, 10);
        breaker.record_failure();
        breaker.record_failure();

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(breaker.allow_attempt());
        breaker.record_success();

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.consecutive_failures(), 0);
        assert_eq!(breaker.metrics().times_closed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_admits_every_probe() {
        let breaker = breaker(1, 10);
        breaker.record_failure();
        tokio::time::advance(Duration::from_secs(10)).await;

        assert!(breaker.allow_attempt());
        assert!(breaker.allow_attempt());
        assert!(breaker.allow_attempt());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_failure_while_open_keeps_cooldown() {
        let breaker = breaker(1, 30);
        breaker.record_failure();
        let opened_at = breaker.opened_at();

        tokio::time::advance(Duration::from_secs(10)).await;
        breaker.record_failure();

        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.opened_at(), opened_at);
        assert_eq!(breaker.consecutive_failures(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_sees_full_cycle() {
        let observer = Arc::new(Transitions::default());
        let breaker = breaker(1, 5).with_observer(observer.clone());

        breaker.record_failure();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(breaker.allow_attempt());
        breaker.record_failure();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(breaker.allow_attempt());
        breaker.record_success();

        let seen = observer.0.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                (CircuitState::Closed, CircuitState::Open),
                (CircuitState::Open, CircuitState::HalfOpen),
                (CircuitState::HalfOpen, CircuitState::Open),
                (CircuitState::Open, CircuitState::HalfOpen),
                (CircuitState::HalfOpen, CircuitState::Closed),
            ]
        );
    }

    #[test]
    fn test_force_open_close() {
        let breaker = CircuitBreaker::with_defaults("/unreliable");
        assert_eq!(breaker.state(), CircuitState::Closed);

        breaker.force_open();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow_attempt());

        breaker.force_close();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.allow_attempt());
    }

    #[test]
    fn test_reset_clears_metrics() {
        let breaker = breaker(1, 30);
        breaker.record_failure();
        breaker.reset();

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.metrics(), BreakerMetrics::default());
    }

    #[test]
    fn test_concurrent_failures_are_all_counted() {
        let breaker = Arc::new(breaker(1000, 30));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let breaker = Arc::clone(&breaker);
                thread::spawn(move || {
                    for _ in 0..100 {
                        breaker.record_failure();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(breaker.consecutive_failures(), 800);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_concurrent_failures_open_exactly_once() {
        let observer = Arc::new(Transitions::default());
        let breaker = Arc::new(breaker(50, 30).with_observer(observer.clone()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let breaker = Arc::clone(&breaker);
                thread::spawn(move || {
                    for _ in 0..25 {
                        breaker.record_failure();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.metrics().times_opened, 1);
        assert_eq!(observer.0.lock().unwrap().len(), 1);
    }
}

//! The guarded call executor.

use crate::circuit_breaker::{BreakerConfig, CircuitBreaker};
use crate::classifier::{classify, DefaultClassifier, OutcomeClassifier};
use crate::config::ResilienceConfig;
use crate::core::{
    AttemptRecord, CallError, CallResult, ConfigError, ConfigResult, Outcome, TransportError,
};
use crate::observer::{dispatch, CallSummary, EventObserver, NoopObserver};
use crate::retry::{RetryConfig, RetryPolicy};

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Builder for creating a [`GuardedExecutor`].
pub struct GuardedExecutorBuilder {
    endpoint: String,
    breaker: Option<Arc<CircuitBreaker>>,
    breaker_config: BreakerConfig,
    retry_config: RetryConfig,
    classifier: Option<Arc<dyn OutcomeClassifier>>,
    observer: Option<Arc<dyn EventObserver>>,
}

impl GuardedExecutorBuilder {
    /// Creates a new builder for `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            breaker: None,
            breaker_config: BreakerConfig::default(),
            retry_config: RetryConfig::default(),
            classifier: None,
            observer: None,
        }
    }

    /// Uses an existing breaker instead of creating one.
    ///
    /// The breaker keeps its own configuration and observer; use this to
    /// share one breaker between several executors for the same endpoint.
    pub fn breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Sets the configuration of the breaker the builder creates.
    pub fn breaker_config(mut self, config: BreakerConfig) -> Self {
        self.breaker_config = config;
        self
    }

    /// Sets the retry configuration.
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Sets both breaker and retry configuration.
    pub fn config(self, config: ResilienceConfig) -> Self {
        self.breaker_config(config.breaker).retry_config(config.retry)
    }

    /// Overrides the outcome classifier.
    pub fn classifier<C: OutcomeClassifier + 'static>(mut self, classifier: C) -> Self {
        self.classifier = Some(Arc::new(classifier));
        self
    }

    /// Overrides the outcome classifier with a shared one.
    pub fn arc_classifier(mut self, classifier: Arc<dyn OutcomeClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Sets the observer for attempts, call completions and, when the builder
    /// creates the breaker, state transitions.
    pub fn observer(mut self, observer: Arc<dyn EventObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Builds the executor, rejecting invalid configuration.
    pub fn build(self) -> ConfigResult<GuardedExecutor> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::invalid("endpoint", "must not be empty"));
        }

        let observer = self.observer.unwrap_or_else(|| Arc::new(NoopObserver));
        let policy = RetryPolicy::new(self.retry_config)?;
        let breaker = match self.breaker {
            Some(breaker) => breaker,
            None => Arc::new(
                CircuitBreaker::new(self.endpoint.clone(), self.breaker_config)?
                    .with_observer(Arc::clone(&observer)),
            ),
        };

        Ok(GuardedExecutor {
            endpoint: self.endpoint,
            breaker,
            policy,
            classifier: self
                .classifier
                .unwrap_or_else(|| Arc::new(DefaultClassifier)),
            observer,
        })
    }
}

/// Runs calls to one endpoint through a circuit breaker and a retry loop.
///
/// The executor is cheap to clone and safe to use from many tasks at once;
/// clones share the same breaker.
///
/// # Example
///
/// ```rust
/// use callguard::executor::GuardedExecutor;
/// use callguard::core::TransportError;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let executor = GuardedExecutor::builder("/status").build().unwrap();
///
/// let result = executor
///     .execute(|| async { Ok::<_, TransportError>("up") })
///     .await;
///
/// assert_eq!(result.value(), Some(&"up"));
/// assert_eq!(result.attempt_count(), 1);
/// # }
/// ```
#[derive(Clone)]
pub struct GuardedExecutor {
    endpoint: String,
    breaker: Arc<CircuitBreaker>,
    policy: RetryPolicy,
    classifier: Arc<dyn OutcomeClassifier>,
    observer: Arc<dyn EventObserver>,
}

impl GuardedExecutor {
    /// Creates a new builder.
    pub fn builder(endpoint: impl Into<String>) -> GuardedExecutorBuilder {
        GuardedExecutorBuilder::new(endpoint)
    }

    /// Returns the protected endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the breaker guarding the endpoint.
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Returns the retry policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `operation` under breaker and retry protection.
    ///
    /// `operation` is invoked once per attempt and must be safe to call
    /// repeatedly. The returned result never carries a raw transport fault:
    /// failures are classified into a [`CallError`].
    pub async fn execute<T, F, Fut>(&self, operation: F) -> CallResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        self.run(operation, None).await
    }

    /// Like [`execute`](Self::execute), but stops as soon as `cancel` fires.
    ///
    /// Cancellation during a backoff sleep or an in-flight attempt returns
    /// [`CallError::Cancelled`]; the interrupted attempt is not recorded and
    /// does not count against the breaker.
    pub async fn execute_with_cancel<T, F, Fut>(
        &self,
        operation: F,
        cancel: &CancellationToken,
    ) -> CallResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        self.run(operation, Some(cancel)).await
    }

    async fn run<T, F, Fut>(
        &self,
        operation: F,
        cancel: Option<&CancellationToken>,
    ) -> CallResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let call_id = Uuid::new_v4();
        let started = Instant::now();

        let result = self.attempt_loop(call_id, operation, cancel).await;

        let summary =
            CallSummary::from_result(call_id, &self.endpoint, &result, started.elapsed());
        dispatch(self.observer.as_ref(), "on_call_complete", |o| {
            o.on_call_complete(&summary)
        });

        result
    }

    async fn attempt_loop<T, F, Fut>(
        &self,
        call_id: Uuid,
        mut operation: F,
        cancel: Option<&CancellationToken>,
    ) -> CallResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut attempts: Vec<AttemptRecord> = Vec::new();

        // Cancelled before the gate: the breaker is never consulted.
        if cancel.is_some_and(|token| token.is_cancelled()) {
            return self.cancelled(attempts, false);
        }

        if !self.breaker.allow_attempt() {
            return CallResult {
                result: Err(CallError::CircuitOpen {
                    endpoint: self.endpoint.clone(),
                    retry_in: self.breaker.remaining_cooldown(),
                }),
                attempts,
                permitted: false,
            };
        }

        let mut attempt: u32 = 1;
        loop {
            let waited = self.policy.backoff_for(attempt);
            if !waited.is_zero() {
                tracing::debug!(
                    call_id = %call_id,
                    endpoint = %self.endpoint,
                    attempt = attempt,
                    delay_ms = waited.as_millis() as u64,
                    "Retrying after backoff"
                );
                if !sleep_unless_cancelled(waited, cancel).await {
                    return self.cancelled(attempts, true);
                }
            }

            let started = Instant::now();
            let output = match self.invoke(&mut operation, cancel).await {
                Some(output) => output,
                None => return self.cancelled(attempts, true),
            };
            let elapsed = started.elapsed();

            let outcome = classify(self.classifier.as_ref(), &output);
            let mut record = AttemptRecord::new(attempt, outcome, elapsed, waited);
            if let Err(error) = &output {
                record = record.with_error(error.to_string());
            }
            dispatch(self.observer.as_ref(), "on_attempt", |o| {
                o.on_attempt(&record, &self.endpoint)
            });
            attempts.push(record);

            let error = match output {
                Ok(value) => {
                    self.breaker.record_success();
                    return CallResult {
                        result: Ok(value),
                        attempts,
                        permitted: true,
                    };
                }
                Err(error) => error,
            };

            // Every failed attempt counts, including ones that will be retried.
            self.breaker.record_failure();

            if outcome == Outcome::NonRetryableFailure {
                return CallResult {
                    result: Err(CallError::NonRetryable {
                        endpoint: self.endpoint.clone(),
                        attempts: attempt,
                        source: error,
                    }),
                    attempts,
                    permitted: true,
                };
            }

            if !self.policy.should_retry(attempt, outcome) {
                return CallResult {
                    result: Err(CallError::RetriesExhausted {
                        endpoint: self.endpoint.clone(),
                        attempts: attempt,
                        last: error,
                    }),
                    attempts,
                    permitted: true,
                };
            }

            tracing::debug!(
                call_id = %call_id,
                endpoint = %self.endpoint,
                attempt = attempt,
                max_attempts = self.policy.max_attempts(),
                error = %error,
                "Transient failure, will retry"
            );
            attempt += 1;
        }
    }

    /// Invokes one attempt, applying the per-attempt deadline.
    ///
    /// Returns `None` if `cancel` fired first.
    async fn invoke<T, F, Fut>(
        &self,
        operation: &mut F,
        cancel: Option<&CancellationToken>,
    ) -> Option<Result<T, TransportError>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let attempt = operation();
        let bounded = async {
            match self.policy.config().attempt_timeout {
                Some(limit) => match tokio::time::timeout(limit, attempt).await {
                    Ok(output) => output,
                    Err(_) => Err(TransportError::timeout(limit)),
                },
                None => attempt.await,
            }
        };

        match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => None,
                output = bounded => Some(output),
            },
            None => Some(bounded.await),
        }
    }

    fn cancelled<T>(&self, attempts: Vec<AttemptRecord>, permitted: bool) -> CallResult<T> {
        tracing::debug!(
            endpoint = %self.endpoint,
            completed_attempts = attempts.len(),
            "Call cancelled"
        );
        CallResult {
            result: Err(CallError::Cancelled {
                endpoint: self.endpoint.clone(),
                attempts: attempts.len() as u32,
            }),
            attempts,
            permitted,
        }
    }
}

/// Sleeps for `duration`; returns `false` if `cancel` fired first.
async fn sleep_unless_cancelled(duration: Duration, cancel: Option<&CancellationToken>) -> bool {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        },
        None => {
            tokio::time::sleep(duration).await;
            true
        }
    }
}

impl fmt::Debug for GuardedExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedExecutor")
            .field("endpoint", &self.endpoint)
            .field("breaker", &self.breaker)
            .field("policy", &self.policy)
            .finish()
    }
}

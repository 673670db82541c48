//! Drives guarded calls against a simulated unreliable endpoint.
//!
//! Run with `RUST_LOG=callguard=debug cargo run --example flaky_endpoint`.
//! Metrics are written to `metrics.json` in the working directory.

use callguard::observer::FanoutObserver;
use callguard::prelude::*;

use rand::Rng;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// A remote that fails most of the time, and sometimes hangs.
struct FlakyEndpoint {
    failure_rate: f64,
    requests: AtomicU32,
}

impl FlakyEndpoint {
    fn new(failure_rate: f64) -> Self {
        Self {
            failure_rate,
            requests: AtomicU32::new(0),
        }
    }

    async fn get(&self) -> Result<String, TransportError> {
        let n = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        let (fails, latency_ms) = {
            let mut rng = rand::thread_rng();
            (rng.gen_bool(self.failure_rate), rng.gen_range(20..200))
        };
        tokio::time::sleep(Duration::from_millis(latency_ms)).await;

        if fails {
            Err(TransportError::connection_failed(format!(
                "connection reset on request {n}"
            )))
        } else {
            Ok(format!("payload #{n}"))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("callguard=info")),
        )
        .init();

    let recorder = Arc::new(MetricsRecorder::new());
    let observer = Arc::new(
        FanoutObserver::new()
            .with(Arc::new(TracingObserver))
            .with(recorder.clone()),
    );

    let endpoint = Arc::new(FlakyEndpoint::new(0.7));

    // Breaker only: every failure counts, no retries.
    let breaker_only = GuardedExecutor::builder("/unreliable")
        .config(
            ResilienceConfig::new()
                .with_breaker(
                    BreakerConfig::new()
                        .with_failure_threshold(3)
                        .with_reset_timeout(Duration::from_secs(3)),
                )
                .with_retry(RetryConfig::no_retry()),
        )
        .observer(observer.clone())
        .build()?;

    println!("== circuit breaker ==");
    for i in 1..=10 {
        let result = breaker_only.execute(|| endpoint.get()).await;
        match result.into_result() {
            Ok(body) => println!("call {i}: ok ({body})"),
            Err(err) => println!("call {i}: {} ({err})", err.kind()),
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    if let Some(wait) = breaker_only.breaker().remaining_cooldown() {
        println!("waiting {:?} for the breaker to admit a probe", wait);
        tokio::time::sleep(wait).await;
    }
    let probe = breaker_only.execute(|| endpoint.get()).await;
    let gate = breaker_only.breaker().metrics();
    println!(
        "probe: {} -> breaker is {} ({} admitted, {} rejected, {:.0}% failed)",
        if probe.is_success() { "ok" } else { "failed" },
        breaker_only.breaker().state(),
        gate.permitted,
        gate.rejected,
        gate.failure_rate() * 100.0
    );

    // Retries with a short backoff and a per-attempt deadline.
    let with_retry = GuardedExecutor::builder("/slow")
        .breaker_config(BreakerConfig::lenient())
        .retry_config(
            RetryConfig::new()
                .with_max_attempts(3)
                .with_base_delay(Duration::from_millis(200))
                .with_max_delay(Duration::from_secs(2))
                .with_jitter(true)
                .with_attempt_timeout(Duration::from_millis(150)),
        )
        .observer(observer.clone())
        .build()?;

    println!("== retry ==");
    for i in 1..=5 {
        let result = with_retry.execute(|| endpoint.get()).await;
        println!(
            "call {i}: {} after {} attempts, waited {:?}",
            result
                .error_kind()
                .map_or("success", |kind| kind.name()),
            result.attempt_count(),
            result.delays().iter().sum::<Duration>()
        );
    }

    recorder.write_json("metrics.json")?;

    let report = recorder.report();
    for (name, metrics) in &report.endpoints {
        println!(
            "{name}: {} ok, {} failed, {} rejected, success rate {:.0}%",
            metrics.success,
            metrics.failure,
            metrics.rejected,
            metrics.success_rate() * 100.0
        );
    }
    println!("{} state transitions", report.state_transitions.len());

    Ok(())
}

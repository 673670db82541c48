//! # Callguard
//!
//! Circuit breaking and retries for calls to unreliable remote endpoints.
//!
//! ## Overview
//!
//! Callguard wraps a fallible async operation so that:
//!
//! - Repeated failures trip a per-endpoint circuit breaker, after which calls
//!   fail fast without touching the remote
//! - After a cool-down the breaker admits probe calls and closes again once
//!   one succeeds
//! - Transient failures are retried with exponential backoff
//! - Each attempt is classified by a pluggable classifier
//! - State transitions, attempts and call completions are reported to an
//!   observer of your choice
//!
//! ## Quick Start
//!
//! ```rust
//! use callguard::prelude::*;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let recorder = Arc::new(MetricsRecorder::new());
//!
//! let executor = GuardedExecutor::builder("/inventory")
//!     .config(ResilienceConfig::default())
//!     .observer(recorder.clone())
//!     .build()?;
//!
//! let result = executor
//!     .execute(|| async { Ok::<_, TransportError>(42) })
//!     .await;
//!
//! assert_eq!(result.value(), Some(&42));
//! assert_eq!(recorder.endpoint("/inventory").map(|m| m.success), Some(1));
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - `http` - Converts `reqwest` errors into [`TransportError`]
//!
//! ## Architecture
//!
//! - **Core**: Outcomes, attempt records, and error types
//! - **Classifier**: Maps attempt results to outcomes
//! - **Retry**: Backoff schedule and retry decisions
//! - **Circuit Breaker**: Per-endpoint failure gate
//! - **Executor**: Runs one call through the gate and the retry loop
//! - **Observer**: Event sinks for logging and metrics
//! - **Config**: Loading breaker and retry settings from TOML or JSON

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod circuit_breaker;
pub mod classifier;
pub mod config;
pub mod core;
pub mod executor;
pub mod observer;
pub mod retry;

// Re-export commonly used types at the crate root
pub use crate::core::{
    AttemptRecord, CallError, CallResult, ConfigError, ErrorKind, Outcome, TransportError,
};

pub use crate::circuit_breaker::{BreakerConfig, CircuitBreaker, CircuitState};
pub use crate::classifier::{DefaultClassifier, HttpStatusClassifier, OutcomeClassifier};
pub use crate::config::ResilienceConfig;
pub use crate::executor::{GuardedExecutor, GuardedExecutorBuilder};
pub use crate::observer::{EventObserver, MetricsRecorder, TracingObserver};
pub use crate::retry::{RetryConfig, RetryPolicy};

/// Prelude module for convenient imports.
///
/// ```rust
/// use callguard::prelude::*;
/// ```
pub mod prelude {
    pub use crate::circuit_breaker::{BreakerConfig, CircuitBreaker, CircuitState};
    pub use crate::classifier::{DefaultClassifier, HttpStatusClassifier, OutcomeClassifier};
    pub use crate::config::ResilienceConfig;
    pub use crate::core::{
        AttemptRecord, CallError, CallResult, ConfigError, ErrorKind, Outcome, TransportError,
    };
    pub use crate::executor::{GuardedExecutor, GuardedExecutorBuilder};
    pub use crate::observer::{
        EventObserver, FanoutObserver, MetricsRecorder, NoopObserver, TracingObserver,
    };
    pub use crate::retry::{RetryConfig, RetryPolicy};
}

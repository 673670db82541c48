//! Circuit breaker for protected endpoints.
//!
//! The circuit breaker pattern stops traffic to a failing remote once a
//! threshold of consecutive failures is reached, and probes it again after a
//! cool-down.
//!
//! ## States
//!
//! - **Closed**: Normal operation; calls pass through.
//! - **Open**: The remote is failing; calls are rejected immediately.
//! - **Half-Open**: Probing the remote to see if it has recovered.
//!
//! ## Usage
//!
//! ```rust
//! use callguard::circuit_breaker::{BreakerConfig, CircuitBreaker};
//! use std::time::Duration;
//!
//! let config = BreakerConfig::default()
//!     .with_failure_threshold(5)
//!     .with_reset_timeout(Duration::from_secs(30));
//!
//! let breaker = CircuitBreaker::new("/unreliable", config).unwrap();
//! assert!(breaker.allow_attempt());
//! ```

mod breaker;
mod config;
mod state;

pub use breaker::CircuitBreaker;
pub use config::BreakerConfig;
pub use state::{BreakerMetrics, BreakerRuntime, CircuitState};

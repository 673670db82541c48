//! Retry policy with exponential backoff.
//!
//! ```rust
//! use callguard::retry::{RetryConfig, RetryPolicy};
//! use callguard::core::Outcome;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new(
//!     RetryConfig::new()
//!         .with_max_attempts(3)
//!         .with_base_delay(Duration::from_secs(1))
//!         .with_max_delay(Duration::from_secs(10)),
//! )
//! .unwrap();
//!
//! assert_eq!(policy.next_delay(1), Duration::ZERO);
//! assert_eq!(policy.next_delay(3), Duration::from_secs(2));
//! assert!(policy.should_retry(2, Outcome::TransientFailure));
//! ```

mod config;
mod policy;

pub use config::RetryConfig;
pub use policy::RetryPolicy;

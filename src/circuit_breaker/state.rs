//! Circuit breaker state machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;

/// The state of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls pass through; failures are counted.
    #[default]
    Closed,
    /// Calls are rejected until the reset timeout elapses.
    Open,
    /// Probe calls are admitted to test whether the remote recovered.
    HalfOpen,
}

impl CircuitState {
    /// Returns the name of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Mutable breaker state, owned by one breaker behind its lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerRuntime {
    /// Current state.
    pub state: CircuitState,
    /// Consecutive failures since the last success or reopen.
    pub consecutive_failures: u32,
    /// When the circuit last opened. Set only while open.
    pub opened_at: Option<Instant>,
}

impl BreakerRuntime {
    /// A closed runtime with no failures.
    pub fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
        }
    }

    /// Returns `true` if the circuit is closed.
    pub fn is_closed(&self) -> bool {
        self.state == CircuitState::Closed
    }

    /// Returns `true` if the circuit is open.
    pub fn is_open(&self) -> bool {
        self.state == CircuitState::Open
    }

    /// Returns `true` if the circuit is half-open.
    pub fn is_half_open(&self) -> bool {
        self.state == CircuitState::HalfOpen
    }
}

impl Default for BreakerRuntime {
    fn default() -> Self {
        Self::closed()
    }
}

/// Counters describing what a breaker has done.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerMetrics {
    /// Gate checks that admitted a call.
    pub permitted: u64,
    /// Gate checks that rejected a call.
    pub rejected: u64,
    /// Successes recorded.
    pub successes: u64,
    /// Failures recorded.
    pub failures: u64,
    /// Number of times the circuit opened.
    pub times_opened: u64,
    /// Number of times the circuit closed from half-open.
    pub times_closed: u64,
}

impl BreakerMetrics {
    /// Creates new empty metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the failure rate over recorded outcomes (0.0 to 1.0).
    pub fn failure_rate(&self) -> f64 {
        let total = self.successes + self.failures;
        if total == 0 {
            return 0.0;
        }
        self.failures as f64 / total as f64
    }
}

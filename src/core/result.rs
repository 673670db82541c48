//! Call result structures.
//!
//! A guarded call produces one [`AttemptRecord`] per attempt and a single
//! [`CallResult`] that carries the final value or error together with the
//! full attempt history.

use crate::core::error::{CallError, ErrorKind};
use crate::core::types::Outcome;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The observable result of one try within a call's retry loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Attempt number, starting at 1.
    pub attempt: u32,

    /// Classified outcome of the attempt.
    pub outcome: Outcome,

    /// How long the transport took for this attempt.
    #[serde(with = "duration_serde")]
    pub elapsed: Duration,

    /// How long the call slept before this attempt (zero for the first).
    #[serde(with = "duration_serde")]
    pub waited_before: Duration,

    /// Display text of the transport fault, if the attempt failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AttemptRecord {
    /// Creates a new attempt record.
    pub fn new(attempt: u32, outcome: Outcome, elapsed: Duration, waited_before: Duration) -> Self {
        Self {
            attempt,
            outcome,
            elapsed,
            waited_before,
            error: None,
        }
    }

    /// Attaches the transport fault text.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// The result of a guarded call, returned to the caller.
#[derive(Debug)]
pub struct CallResult<T> {
    /// The value on success, or the classified failure.
    pub result: Result<T, CallError>,

    /// Every attempt made, in order.
    pub attempts: Vec<AttemptRecord>,

    /// Whether the circuit breaker allowed the call through.
    pub permitted: bool,
}

impl<T> CallResult<T> {
    /// Returns `true` if the call produced a value.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Returns the error kind, or `None` on success.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.result.as_ref().err().map(CallError::kind)
    }

    /// Returns the value, if any.
    pub fn value(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    /// Returns the error, if any.
    pub fn error(&self) -> Option<&CallError> {
        self.result.as_ref().err()
    }

    /// Returns the number of attempts made.
    pub fn attempt_count(&self) -> u32 {
        self.attempts.len() as u32
    }

    /// Returns the backoff slept before each attempt.
    pub fn delays(&self) -> Vec<Duration> {
        self.attempts.iter().map(|a| a.waited_before).collect()
    }

    /// Returns the total time spent inside the transport.
    pub fn total_elapsed(&self) -> Duration {
        self.attempts.iter().map(|a| a.elapsed).sum()
    }

    /// Consumes the result, discarding the attempt history.
    pub fn into_result(self) -> Result<T, CallError> {
        self.result
    }
}

/// Serializes durations as integer milliseconds.
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Like [`duration_serde`], for optional durations.
pub(crate) mod option_duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration
            .map(|d| d.as_millis() as u64)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}

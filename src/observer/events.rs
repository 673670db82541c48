//! Event types delivered to observers.

use crate::circuit_breaker::CircuitState;
use crate::core::result::duration_serde;
use crate::core::{CallResult, ErrorKind};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// A circuit breaker changed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransitionEvent {
    /// The endpoint the breaker protects.
    pub endpoint: String,

    /// State before the transition.
    pub from: CircuitState,

    /// State after the transition.
    pub to: CircuitState,

    /// Wall-clock time of the transition.
    pub timestamp: DateTime<Utc>,

    /// Consecutive failures counted when the transition happened.
    pub consecutive_failures: u32,
}

impl StateTransitionEvent {
    /// Creates an event stamped with the current time.
    pub fn new(
        endpoint: impl Into<String>,
        from: CircuitState,
        to: CircuitState,
        consecutive_failures: u32,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            from,
            to,
            timestamp: Utc::now(),
            consecutive_failures,
        }
    }
}

/// Summary of one finished guarded call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSummary {
    /// Unique ID of the call.
    pub call_id: Uuid,

    /// The endpoint the call was made against.
    pub endpoint: String,

    /// Failure kind, or `None` if the call succeeded.
    pub error_kind: Option<ErrorKind>,

    /// Error message, if the call failed.
    pub error: Option<String>,

    /// Number of attempts made.
    pub attempts: u32,

    /// Whether the breaker let the call through.
    pub permitted: bool,

    /// Time from the gate check to the final result, backoff included.
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

impl CallSummary {
    /// Builds a summary from a finished call.
    pub fn from_result<T>(
        call_id: Uuid,
        endpoint: impl Into<String>,
        result: &CallResult<T>,
        duration: Duration,
    ) -> Self {
        Self {
            call_id,
            endpoint: endpoint.into(),
            error_kind: result.error_kind(),
            error: result.error().map(|e| e.to_string()),
            attempts: result.attempt_count(),
            permitted: result.permitted,
            duration,
        }
    }

    /// Returns `true` if the call succeeded.
    pub fn is_success(&self) -> bool {
        self.error_kind.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AttemptRecord, CallError, Outcome};

    #[test]
    fn test_transition_event_serializes() {
        let event =
            StateTransitionEvent::new("/unreliable", CircuitState::Closed, CircuitState::Open, 3);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["endpoint"], "/unreliable");
        assert_eq!(json["from"], "closed");
        assert_eq!(json["to"], "open");
        assert_eq!(json["consecutive_failures"], 3);
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_call_summary_from_result() {
        let result: CallResult<()> = CallResult {
            result: Err(CallError::CircuitOpen {
                endpoint: "/unreliable".into(),
                retry_in: None,
            }),
            attempts: Vec::new(),
            permitted: false,
        };

        let summary =
            CallSummary::from_result(Uuid::new_v4(), "/unreliable", &result, Duration::ZERO);
        assert!(!summary.is_success());
        assert_eq!(summary.error_kind, Some(ErrorKind::CircuitOpen));
        assert_eq!(summary.attempts, 0);
        assert!(!summary.permitted);

        let ok = CallResult {
            result: Ok(1),
            attempts: vec![AttemptRecord::new(
                1,
                Outcome::Success,
                Duration::from_millis(4),
                Duration::ZERO,
            )],
            permitted: true,
        };
        let summary = CallSummary::from_result(Uuid::new_v4(), "/slow", &ok, Duration::ZERO);
        assert!(summary.is_success());
        assert_eq!(summary.error, None);
    }
}

//! Common types shared by the classifier, retry policy and executor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The classified outcome of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The remote operation succeeded.
    Success,
    /// The attempt failed in a way that may succeed on retry.
    TransientFailure,
    /// The attempt failed in a way that will recur on retry.
    NonRetryableFailure,
}

impl Outcome {
    /// Returns `true` for [`Outcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns `true` for either failure variant.
    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// Returns `true` for [`Outcome::TransientFailure`].
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientFailure)
    }

    /// Returns the name of the outcome.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::TransientFailure => "transient_failure",
            Self::NonRetryableFailure => "non_retryable_failure",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_predicates() {
        assert!(Outcome::Success.is_success());
        assert!(!Outcome::Success.is_failure());
        assert!(Outcome::TransientFailure.is_transient());
        assert!(Outcome::NonRetryableFailure.is_failure());
        assert!(!Outcome::NonRetryableFailure.is_transient());
    }

    #[test]
    fn test_outcome_serializes_snake_case() {
        let json = serde_json::to_string(&Outcome::TransientFailure).unwrap();
        assert_eq!(json, "\"transient_failure\"");
    }
}

//! Built-in classification policies.

use crate::classifier::OutcomeClassifier;
use crate::core::{Outcome, TransportError};

/// The default policy.
///
/// Transport-level faults (connection failures, timeouts, malformed
/// responses and anything else below the protocol) are transient. A
/// well-formed error response or an invalid request is not retried.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl OutcomeClassifier for DefaultClassifier {
    fn classify_failure(&self, error: &TransportError) -> Outcome {
        if error.is_transport_level() {
            Outcome::TransientFailure
        } else {
            Outcome::NonRetryableFailure
        }
    }
}

/// A policy for HTTP transports.
///
/// Behaves like [`DefaultClassifier`], except that `408 Request Timeout`,
/// `429 Too Many Requests` and every `5xx` status count as transient:
/// the server may answer differently next time.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpStatusClassifier;

impl HttpStatusClassifier {
    fn is_retryable_status(code: u16) -> bool {
        matches!(code, 408 | 429 | 500..=599)
    }
}

impl OutcomeClassifier for HttpStatusClassifier {
    fn classify_failure(&self, error: &TransportError) -> Outcome {
        match error {
            TransportError::Status { code, .. } if Self::is_retryable_status(*code) => {
                Outcome::TransientFailure
            }
            other => DefaultClassifier.classify_failure(other),
        }
    }
}

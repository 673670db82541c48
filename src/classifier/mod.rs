//! Outcome classification.
//!
//! A classifier maps the raw result of one attempt to an [`Outcome`]. Every
//! successful result is [`Outcome::Success`]; failures are delegated to an
//! [`OutcomeClassifier`], which is supplied when the executor is built so
//! that different transports can decide what is worth retrying.
//!
//! ## Usage
//!
//! ```rust
//! use callguard::classifier::{classify, DefaultClassifier, OutcomeClassifier};
//! use callguard::core::{Outcome, TransportError};
//!
//! let classifier = DefaultClassifier;
//! let result: Result<(), _> = Err(TransportError::connection_failed("refused"));
//! assert_eq!(classify(&classifier, &result), Outcome::TransientFailure);
//!
//! // Any closure is a classifier too.
//! let everything_transient = |_: &TransportError| Outcome::TransientFailure;
//! let result: Result<(), _> = Err(TransportError::status(400, "bad request"));
//! assert_eq!(classify(&everything_transient, &result), Outcome::TransientFailure);
//! ```

mod builtin;

pub use builtin::{DefaultClassifier, HttpStatusClassifier};

use crate::core::{Outcome, TransportError};

/// Strategy that decides how a failed attempt is treated.
///
/// Implementations must be pure: the same error always yields the same
/// outcome.
pub trait OutcomeClassifier: Send + Sync {
    /// Classifies a transport fault.
    fn classify_failure(&self, error: &TransportError) -> Outcome;
}

impl<F> OutcomeClassifier for F
where
    F: Fn(&TransportError) -> Outcome + Send + Sync,
{
    fn classify_failure(&self, error: &TransportError) -> Outcome {
        self(error)
    }
}

/// Classifies the raw result of one attempt.
///
/// A failure carries no value, so a classifier answering `Success` for one
/// is treated as `NonRetryableFailure`.
pub fn classify<C, T>(classifier: &C, result: &Result<T, TransportError>) -> Outcome
where
    C: OutcomeClassifier + ?Sized,
{
    match result {
        Ok(_) => Outcome::Success,
        Err(error) => match classifier.classify_failure(error) {
            Outcome::Success => Outcome::NonRetryableFailure,
            outcome => outcome,
        },
    }
}

//! Error types for the callguard library.
//!
//! Three families of errors live here:
//!
//! - [`TransportError`] is what a protected operation reports when the remote
//!   call fails. It is classified, never surfaced raw.
//! - [`CallError`] is the final, already-classified failure handed back to
//!   the caller of a guarded call.
//! - [`ConfigError`] rejects invalid configuration at construction time.

use std::time::Duration;
use thiserror::Error;

/// A fault reported by the transport collaborator for a single attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The remote could not be reached.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        /// Description of the connection failure.
        message: String,
    },

    /// The attempt did not complete within its deadline.
    #[error("request timed out after {elapsed:?}")]
    Timeout {
        /// How long the attempt ran before timing out.
        elapsed: Duration,
    },

    /// The remote answered with something that could not be parsed.
    #[error("malformed response: {details}")]
    MalformedResponse {
        /// What was wrong with the response.
        details: String,
    },

    /// The remote answered with a well-formed error response.
    #[error("remote returned status {code}: {message}")]
    Status {
        /// Protocol status code (e.g. an HTTP status).
        code: u16,
        /// Message or reason phrase that came with the status.
        message: String,
    },

    /// The request itself is invalid and will fail on every attempt.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// Why the request is invalid.
        reason: String,
    },

    /// Any other transport-level fault.
    #[error("transport error: {message}")]
    Other {
        /// Description of the fault.
        message: String,
    },
}

impl TransportError {
    /// Creates a `ConnectionFailed` error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
        }
    }

    /// Creates a `Timeout` error.
    pub fn timeout(elapsed: Duration) -> Self {
        Self::Timeout { elapsed }
    }

    /// Creates a `MalformedResponse` error.
    pub fn malformed(details: impl Into<String>) -> Self {
        Self::MalformedResponse {
            details: details.into(),
        }
    }

    /// Creates a `Status` error.
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }

    /// Creates an `InvalidRequest` error.
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Creates an `Other` error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Returns `true` if the fault happened below the application protocol,
    /// i.e. no well-formed answer was received from the remote.
    pub fn is_transport_level(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::Timeout { .. }
                | Self::MalformedResponse { .. }
                | Self::Other { .. }
        )
    }

    /// Returns the status code if the remote answered with one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::status(status.as_u16(), err.to_string());
        }
        if err.is_timeout() {
            // reqwest does not report how long the request ran
            return Self::timeout(Duration::ZERO);
        }
        if err.is_connect() {
            return Self::connection_failed(err.to_string());
        }
        if err.is_decode() || err.is_body() {
            return Self::malformed(err.to_string());
        }
        if err.is_builder() {
            return Self::invalid_request(err.to_string());
        }
        Self::other(err.to_string())
    }
}

/// The kind of a failed guarded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The circuit breaker denied the call; the transport was not invoked.
    CircuitOpen,
    /// The failure was classified as one that will recur on retry.
    NonRetryable,
    /// Every permitted attempt failed transiently.
    RetriesExhausted,
    /// The caller cancelled the call while it was in flight.
    Cancelled,
}

impl ErrorKind {
    /// Returns the name of the kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CircuitOpen => "circuit_open",
            Self::NonRetryable => "non_retryable",
            Self::RetriesExhausted => "retries_exhausted",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The final failure of a guarded call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The circuit breaker is open for this endpoint.
    #[error("circuit breaker open for endpoint '{endpoint}'")]
    CircuitOpen {
        /// The protected endpoint.
        endpoint: String,
        /// Time left until the breaker will admit a probe, if known.
        retry_in: Option<Duration>,
    },

    /// The attempt failed with a fault that retrying cannot fix.
    #[error("non-retryable failure on attempt {attempts} for endpoint '{endpoint}': {source}")]
    NonRetryable {
        /// The protected endpoint.
        endpoint: String,
        /// Number of attempts made, including the failing one.
        attempts: u32,
        /// The transport fault.
        source: TransportError,
    },

    /// All attempts failed transiently.
    #[error("retries exhausted after {attempts} attempts for endpoint '{endpoint}': {last}")]
    RetriesExhausted {
        /// The protected endpoint.
        endpoint: String,
        /// Number of attempts made.
        attempts: u32,
        /// The fault of the last attempt.
        last: TransportError,
    },

    /// The caller cancelled the call.
    #[error("call to endpoint '{endpoint}' was cancelled after {attempts} completed attempts")]
    Cancelled {
        /// The protected endpoint.
        endpoint: String,
        /// Number of attempts that completed before cancellation.
        attempts: u32,
    },
}

impl CallError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            Self::NonRetryable { .. } => ErrorKind::NonRetryable,
            Self::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Returns the endpoint the call was made against.
    pub fn endpoint(&self) -> &str {
        match self {
            Self::CircuitOpen { endpoint, .. }
            | Self::NonRetryable { endpoint, .. }
            | Self::RetriesExhausted { endpoint, .. }
            | Self::Cancelled { endpoint, .. } => endpoint,
        }
    }

    /// Returns the last transport fault, if the remote was reached at all.
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            Self::NonRetryable { source, .. } => Some(source),
            Self::RetriesExhausted { last, .. } => Some(last),
            _ => None,
        }
    }

    /// Returns the human-readable message for this error.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Invalid configuration, rejected when a component is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A field holds a value outside its valid range.
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value is invalid.
        reason: String,
    },

    /// A configuration document could not be parsed.
    #[error("failed to parse configuration: {message}")]
    Parse {
        /// Parser error message.
        message: String,
    },

    /// A configuration file could not be read.
    #[error("failed to read configuration file '{path}': {message}")]
    Read {
        /// Path of the file.
        path: String,
        /// I/O error message.
        message: String,
    },
}

impl ConfigError {
    /// Creates an `InvalidValue` error.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// A specialized `Result` type for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_is_transport_level() {
        assert!(TransportError::timeout(Duration::from_secs(5)).is_transport_level());
        assert!(TransportError::connection_failed("refused").is_transport_level());
        assert!(TransportError::malformed("truncated json").is_transport_level());
        assert!(!TransportError::status(500, "boom").is_transport_level());
        assert!(!TransportError::invalid_request("missing id").is_transport_level());
    }

    #[test]
    fn test_transport_error_status_code() {
        assert_eq!(TransportError::status(503, "unavailable").status_code(), Some(503));
        assert_eq!(TransportError::other("reset").status_code(), None);
    }

    #[test]
    fn test_call_error_kind_and_endpoint() {
        let err = CallError::RetriesExhausted {
            endpoint: "/slow".into(),
            attempts: 3,
            last: TransportError::timeout(Duration::from_secs(15)),
        };
        assert_eq!(err.kind(), ErrorKind::RetriesExhausted);
        assert_eq!(err.endpoint(), "/slow");
        assert!(matches!(
            err.transport_error(),
            Some(TransportError::Timeout { .. })
        ));

        let open = CallError::CircuitOpen {
            endpoint: "/unreliable".into(),
            retry_in: None,
        };
        assert_eq!(open.kind(), ErrorKind::CircuitOpen);
        assert!(open.transport_error().is_none());
    }

    #[test]
    fn test_call_error_display() {
        let err = CallError::NonRetryable {
            endpoint: "/orders".into(),
            attempts: 1,
            source: TransportError::status(400, "bad request"),
        };
        let message = err.message();
        assert!(message.contains("/orders"));
        assert!(message.contains("400"));
    }

    #[test]
    fn test_error_kind_names() {
        assert_eq!(ErrorKind::CircuitOpen.to_string(), "circuit_open");
        assert_eq!(ErrorKind::Cancelled.name(), "cancelled");
    }
}

//! Core types for the callguard library.
//!
//! - [`types`] - The classified [`Outcome`] of an attempt
//! - [`error`] - Transport faults, call errors and configuration errors
//! - [`result`] - Attempt records and call results

pub mod error;
pub mod result;
pub mod types;

pub use error::{CallError, ConfigError, ConfigResult, ErrorKind, TransportError};
pub use result::{AttemptRecord, CallResult};
pub use types::Outcome;

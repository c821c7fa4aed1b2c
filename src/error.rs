// src/error.rs
//! Error taxonomy for the trust registry.
//!
//! Every public operation returns `Result<T, RegistryError>`. The first four
//! kinds are detected locally before anything is submitted to the ledger;
//! `Conflict`, `Timeout` and `LedgerRejected` only surface after submission.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Registry-level failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Malformed DID, oversized name, zero page size and similar input faults.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The caller does not hold the scope the operation requires.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Duplicate registration of an issuer or an issuer type.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Unknown or tombstoned DID, or unknown issuer type.
    #[error("not found: {0}")]
    NotFound(String),

    /// The ledger state the transaction was built against has moved on.
    ///
    /// Versions are ledger heights; `None` means the key did not exist.
    #[error("conflict on {resource}: expected version {expected:?}, observed {observed:?}")]
    Conflict {
        /// Ledger key whose version no longer matched.
        resource: String,
        /// Version the transaction was built against.
        expected: Option<u64>,
        /// Version the ledger held when the transaction was sequenced.
        observed: Option<u64>,
    },

    /// The ledger gateway did not answer within the configured bound.
    #[error("ledger call timed out after {0:?}")]
    Timeout(Duration),

    /// The ledger refused or failed the call for a reason opaque to this layer.
    #[error("ledger rejected the request: {0}")]
    LedgerRejected(String),
}

/// Machine-readable discriminant of a [`RegistryError`], used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidArgument,
    Unauthorized,
    AlreadyExists,
    NotFound,
    Conflict,
    Timeout,
    LedgerRejected,
}

impl RegistryError {
    /// Returns the wire discriminant for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::LedgerRejected(_) => ErrorKind::LedgerRejected,
        }
    }

    /// Whether a caller may meaningfully resubmit after refreshing its view.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Timeout(_))
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub(crate) fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub(crate) fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::Timeout => "TIMEOUT",
            Self::LedgerRejected => "LEDGER_REJECTED",
        };
        f.write_str(name)
    }
}

/// Convenience alias used across the crate.
pub type Result<T, E = RegistryError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_is_retryable_and_reports_versions() {
        let err = RegistryError::Conflict {
            resource: "type/KYC/head".to_string(),
            expected: Some(3),
            observed: Some(4),
        };
        assert!(err.is_retryable());
        assert_eq!(err.kind(), ErrorKind::Conflict);
        let msg = err.to_string();
        assert!(msg.contains("Some(3)"));
        assert!(msg.contains("Some(4)"));
    }

    #[test]
    fn test_validation_errors_are_not_retryable() {
        assert!(!RegistryError::invalid("bad did").is_retryable());
        assert!(!RegistryError::not_found("did:weid:1").is_retryable());
        assert!(!RegistryError::LedgerRejected("out of gas".into()).is_retryable());
    }

    #[test]
    fn test_error_kind_wire_name() {
        let json = serde_json::to_string(&ErrorKind::AlreadyExists).unwrap();
        assert_eq!(json, "\"ALREADY_EXISTS\"");
        assert_eq!(ErrorKind::LedgerRejected.to_string(), "LEDGER_REJECTED");
    }
}

//! Error types for the Tessera control plane
//!
//! This module defines the common error type used throughout the system.
//! Every failure message carries the offending identifier(s) so callers
//! can distinguish causes programmatically, by kind or by substring.

use thiserror::Error;

/// Common result type for Tessera control-plane operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Tessera control plane
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Unknown snapshot, restoration, stream, table, or universe id
    #[error("{0}")]
    NotFound(String),

    /// Malformed request: empty table set, unparseable artifact, etc.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Internal invariant violated, e.g. an unexpected snapshot count
    #[error("corruption: {0}")]
    Corruption(String),

    /// Conflicting concurrent operation, e.g. two restorations on one scope
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// Replication or import schema incompatibility
    #[error("{0}")]
    SchemaMismatch(String),

    /// Identity conflict or ambiguous rename requiring disambiguation
    #[error("already exists: {0}")]
    AlreadyExists(String),

    // Coordination errors
    #[error("request timeout: {0}")]
    Timeout(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    // Internal errors
    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a not found error for the given identifier
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create an illegal state error
    pub fn illegal_state(msg: impl Into<String>) -> Self {
        Self::IllegalState(msg.into())
    }

    /// Create a corruption error
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::Corruption(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this is a retryable coordination error
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Unavailable(_))
    }

    /// Check if this is a not found error
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is an illegal state error
    #[must_use]
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, Self::IllegalState(_))
    }

    /// Check if this is a schema mismatch error
    #[must_use]
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, Self::SchemaMismatch(_))
    }
}

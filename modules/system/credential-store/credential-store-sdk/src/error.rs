//! Error types for the credential store.

use std::fmt;

use thiserror::Error;

/// Kind of record a store operation addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    User,
    Permission,
    PublicKey,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Permission => "permission",
            Self::PublicKey => "public key",
        })
    }
}

/// Errors that can occur when using the credential store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed record does not exist.
    #[error("{kind} with username={key} not found")]
    NotFound { kind: RecordKind, key: String },

    /// A record with the same natural key already exists.
    #[error("{kind} with username={key} already exists")]
    Conflict { kind: RecordKind, key: String },

    /// The store holds records that violate a uniqueness rule.
    #[error("data integrity failure: {0}")]
    Integrity(String),

    /// The backing store could not be reached or timed out.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Any other failure, including undecodable documents.
    #[error("store error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn not_found(kind: RecordKind, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }

    pub fn conflict(kind: RecordKind, key: impl Into<String>) -> Self {
        Self::Conflict {
            kind,
            key: key.into(),
        }
    }

    /// Whether the error means "no such record" rather than a failure.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

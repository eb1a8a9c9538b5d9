//! Error taxonomy for the ABE core.
//!
//! One flat enum instead of per-operation wrapper types: every operation in
//! this crate ends up mapping to one of a small number of caller-visible
//! outcomes (bad input, name clash, missing record, policy not satisfied, a
//! storage backend that misbehaved, a cryptographic operation that couldn't
//! complete, or something that should never happen). Hosts match on the
//! variant to decide a status code; they don't need finer granularity than
//! this.

use std::fmt;

#[derive(Debug)]
pub enum AbeError {
    /// Malformed input: an unparsable policy string, an empty attribute
    /// name, a GID that fails validation, etc.
    BadRequest(String),
    /// The requested write would clobber an existing record that must stay
    /// unique (a reused authority name, the reserved "SA" system attribute).
    Conflict(String),
    /// Lookup against `Storage` came back empty where a record was required.
    NotFound(String),
    /// The policy tree evaluated to false against the keys a GID presented.
    PolicyUnsatisfied(String),
    /// The `Storage` capability returned an error, or left state in an
    /// indeterminate condition (e.g. a partial dual-write).
    StorageFault(String),
    /// A pairing, hashing, or symmetric-cipher operation failed.
    CryptoFault(String),
    /// Anything else — a bug, not a caller mistake.
    Internal(String),
}

impl fmt::Display for AbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbeError::BadRequest(msg) => write!(f, "bad request: {}", msg),
            AbeError::Conflict(msg) => write!(f, "conflict: {}", msg),
            AbeError::NotFound(msg) => write!(f, "not found: {}", msg),
            AbeError::PolicyUnsatisfied(msg) => write!(f, "policy unsatisfied: {}", msg),
            AbeError::StorageFault(msg) => write!(f, "storage fault: {}", msg),
            AbeError::CryptoFault(msg) => write!(f, "crypto fault: {}", msg),
            AbeError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for AbeError {}

impl From<serde_json::Error> for AbeError {
    fn from(e: serde_json::Error) -> Self {
        AbeError::Internal(format!("json: {}", e))
    }
}

pub type AbeResult<T> = Result<T, AbeError>;

//! # Contract Errors
//!
//! One error type for every operation in the crate. Variants follow the
//! failure classes clients already branch on, so a gateway can map them to
//! status codes without string matching.

use gridledger_protocol::StoreError;
use thiserror::Error;

/// Coarse classification of a [`ContractError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    FailedPrecondition,
    PermissionDenied,
    AlreadyExists,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidArgument => write!(f, "InvalidArgument"),
            ErrorKind::NotFound => write!(f, "NotFound"),
            ErrorKind::FailedPrecondition => write!(f, "FailedPrecondition"),
            ErrorKind::PermissionDenied => write!(f, "PermissionDenied"),
            ErrorKind::AlreadyExists => write!(f, "AlreadyExists"),
            ErrorKind::Internal => write!(f, "Internal"),
        }
    }
}

/// Errors returned by contract operations.
#[derive(Debug, Error)]
pub enum ContractError {
    /// Malformed or out-of-range input (non-positive amount, overflow, bad arity).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A record the operation needs does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The records exist but are in the wrong state for this operation.
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    /// The caller's identity or organization is not allowed to do this.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The record the operation would create is already there.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The world state itself failed.
    #[error("state store error: {0}")]
    Store(#[from] StoreError),
}

impl ContractError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ContractError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ContractError::NotFound(_) => ErrorKind::NotFound,
            ContractError::FailedPrecondition(_) => ErrorKind::FailedPrecondition,
            ContractError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            ContractError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            ContractError::Store(_) => ErrorKind::Internal,
        }
    }
}

pub type ContractResult<T> = Result<T, ContractError>;

/// Reject amounts that are zero or negative.
pub(crate) fn require_positive(what: &str, amount: i64) -> ContractResult<()> {
    if amount <= 0 {
        return Err(ContractError::InvalidArgument(format!(
            "{what} must be a positive integer, got {amount}"
        )));
    }
    Ok(())
}

/// `a + b`, or `InvalidArgument` on overflow.
pub(crate) fn checked_add(a: i64, b: i64) -> ContractResult<i64> {
    a.checked_add(b)
        .ok_or_else(|| ContractError::InvalidArgument(format!("amount overflow: {a} + {b}")))
}

/// `a - b`, or `InvalidArgument` on overflow.
pub(crate) fn checked_sub(a: i64, b: i64) -> ContractResult<i64> {
    a.checked_sub(b)
        .ok_or_else(|| ContractError::InvalidArgument(format!("amount overflow: {a} - {b}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(
            ContractError::NotFound("x".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ContractError::Store(StoreError::InvalidKey("k".into())).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn positive_amount_guard() {
        assert!(require_positive("mint amount", 1).is_ok());
        assert!(matches!(
            require_positive("mint amount", 0),
            Err(ContractError::InvalidArgument(_))
        ));
        assert!(require_positive("mint amount", -5).is_err());
    }

    #[test]
    fn overflow_is_invalid_argument() {
        assert!(matches!(
            checked_add(i64::MAX, 1),
            Err(ContractError::InvalidArgument(_))
        ));
        assert_eq!(checked_sub(10, 3).unwrap(), 7);
    }
}

//! Domain errors

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Store failure: {0}")]
    StoreFailure(String),
}

impl DomainError {
    /// Stable, machine-checkable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::NotFound(_) => "not_found",
            DomainError::Conflict(_) => "conflict",
            DomainError::InvalidIdentity(_) => "invalid_identity",
            DomainError::Unauthorized(_) => "unauthorized",
            DomainError::Forbidden(_) => "forbidden",
            DomainError::ValidationError(_) => "validation_error",
            DomainError::StoreFailure(_) => "store_failure",
        }
    }

    pub fn store<E: std::fmt::Display>(err: E) -> Self {
        DomainError::StoreFailure(err.to_string())
    }
}

//! Schema lookup and validation errors.

use thiserror::Error;

/// Error type for schema operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// No object of this kind has the requested ID.
    #[error("{kind} ID {id} not found")]
    NotFound { kind: &'static str, id: u32 },

    /// The schema snapshot is malformed.
    #[error("invalid schema: {0}")]
    Invalid(String),
}

impl SchemaError {
    pub fn invalid(message: impl Into<String>) -> Self {
        SchemaError::Invalid(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SchemaError::NotFound { .. })
    }
}

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

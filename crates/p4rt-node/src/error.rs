//! Status codes and errors reported to clients.

use p4rt_driver::DriverError;
use p4rt_schema::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Canonical status codes of the node API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Ok,
    /// Request does not fit the schema or the protocol rules.
    InvalidArgument,
    /// Unknown table, action, counter or entry.
    NotFound,
    /// Entity kind, match kind or feature not supported by this backend.
    Unimplemented,
    /// Write to a read-only table.
    PermissionDenied,
    /// The backend reported a failure.
    Internal,
    /// Aggregate outcome of a batch in which at least one item failed.
    AtLeastOneFailed,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusCode::Ok => "OK",
            StatusCode::InvalidArgument => "INVALID_ARGUMENT",
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::Unimplemented => "UNIMPLEMENTED",
            StatusCode::PermissionDenied => "PERMISSION_DENIED",
            StatusCode::Internal => "INTERNAL",
            StatusCode::AtLeastOneFailed => "AT_LEAST_ONE_FAILED",
        };
        write!(f, "{}", s)
    }
}

/// Error carrying a status code and a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct NodeError {
    pub code: StatusCode,
    pub message: String,
}

impl NodeError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(StatusCode::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NotFound, message)
    }

    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Unimplemented, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PermissionDenied, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Internal, message)
    }
}

impl From<DriverError> for NodeError {
    fn from(e: DriverError) -> Self {
        if e.is_not_found() {
            NodeError::not_found(e.to_string())
        } else {
            NodeError::internal(e.to_string())
        }
    }
}

impl From<SchemaError> for NodeError {
    fn from(e: SchemaError) -> Self {
        match e {
            SchemaError::NotFound { .. } => NodeError::not_found(e.to_string()),
            SchemaError::Invalid(_) => NodeError::invalid_argument(e.to_string()),
        }
    }
}

/// Result type for node operations.
pub type NodeResult<T> = Result<T, NodeError>;

/// Outcome of one item of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: StatusCode,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            code: StatusCode::Ok,
            message: String::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }
}

impl From<NodeResult<()>> for Status {
    fn from(result: NodeResult<()>) -> Self {
        match result {
            Ok(()) => Status::ok(),
            Err(e) => Status {
                code: e.code,
                message: e.message,
            },
        }
    }
}

/// Per-item outcomes of a batch write or read, positionally aligned with
/// the request, plus their aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub status: Status,
    pub details: Vec<Status>,
}

impl BatchOutcome {
    pub fn from_details(details: Vec<Status>) -> Self {
        let failed = details.iter().filter(|s| !s.is_ok()).count();
        let status = if failed == 0 {
            Status::ok()
        } else {
            Status {
                code: StatusCode::AtLeastOneFailed,
                message: format!("{} of {} items failed", failed, details.len()),
            }
        };
        Self { status, details }
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }
}

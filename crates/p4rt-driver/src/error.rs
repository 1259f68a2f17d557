//! Driver error types and status handling.
//!
//! Backend libraries report outcomes as integer codes. The ASIC SDK uses
//! negative status values, the kernel dataplane library returns positive
//! `errno` values. Both are folded into [`DriverStatus`] and then into
//! Rust's `Result` type.

use std::fmt;
use thiserror::Error;

/// Driver status codes.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverStatus {
    Success = 0,
    Failure = -1,
    NotSupported = -2,
    NoMemory = -3,
    InsufficientResources = -4,
    InvalidParameter = -5,
    ItemAlreadyExists = -6,
    ItemNotFound = -7,
    TableFull = -8,
    Uninitialized = -9,
    ObjectInUse = -10,
    NotExecuted = -11,
    InvalidHandle = -12,
}

// errno values returned by the kernel dataplane library.
const ENOENT: i32 = 2;
const ENOMEM: i32 = 12;
const EBUSY: i32 = 16;
const EEXIST: i32 = 17;
const EINVAL: i32 = 22;
const ENOSPC: i32 = 28;
const EOPNOTSUPP: i32 = 95;

impl DriverStatus {
    /// Creates a DriverStatus from a raw backend return value.
    pub fn from_raw(status: i32) -> Self {
        match status {
            0 => DriverStatus::Success,
            -1 => DriverStatus::Failure,
            -2 | EOPNOTSUPP => DriverStatus::NotSupported,
            -3 | ENOMEM => DriverStatus::NoMemory,
            -4 => DriverStatus::InsufficientResources,
            -5 | EINVAL => DriverStatus::InvalidParameter,
            -6 | EEXIST => DriverStatus::ItemAlreadyExists,
            -7 | ENOENT => DriverStatus::ItemNotFound,
            -8 | ENOSPC => DriverStatus::TableFull,
            -9 => DriverStatus::Uninitialized,
            -10 | EBUSY => DriverStatus::ObjectInUse,
            -11 => DriverStatus::NotExecuted,
            -12 => DriverStatus::InvalidHandle,
            _ => DriverStatus::Failure,
        }
    }

    /// Returns true if the status indicates success.
    pub fn is_success(&self) -> bool {
        *self == DriverStatus::Success
    }

    /// Converts to a Result, returning Ok(()) for success.
    pub fn into_result(self) -> DriverResult<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(DriverError::from_status(self))
        }
    }
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriverStatus::Success => "STATUS_SUCCESS",
            DriverStatus::Failure => "STATUS_FAILURE",
            DriverStatus::NotSupported => "STATUS_NOT_SUPPORTED",
            DriverStatus::NoMemory => "STATUS_NO_MEMORY",
            DriverStatus::InsufficientResources => "STATUS_INSUFFICIENT_RESOURCES",
            DriverStatus::InvalidParameter => "STATUS_INVALID_PARAMETER",
            DriverStatus::ItemAlreadyExists => "STATUS_ITEM_ALREADY_EXISTS",
            DriverStatus::ItemNotFound => "STATUS_ITEM_NOT_FOUND",
            DriverStatus::TableFull => "STATUS_TABLE_FULL",
            DriverStatus::Uninitialized => "STATUS_UNINITIALIZED",
            DriverStatus::ObjectInUse => "STATUS_OBJECT_IN_USE",
            DriverStatus::NotExecuted => "STATUS_NOT_EXECUTED",
            DriverStatus::InvalidHandle => "STATUS_INVALID_HANDLE",
        };
        write!(f, "{}", s)
    }
}

/// Error type for driver operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// The backend returned an error status.
    #[error("driver operation failed: {status}")]
    Status { status: DriverStatus },

    /// The requested feature is not supported by this backend.
    #[error("feature not supported: {feature}")]
    NotSupported { feature: String },

    /// Invalid parameter passed to the backend.
    #[error("invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// The requested item was not found.
    #[error("item not found: {item}")]
    NotFound { item: String },

    /// The item already exists.
    #[error("item already exists: {item}")]
    AlreadyExists { item: String },

    /// A handle was used after release or never acquired.
    #[error("invalid handle: {handle}")]
    InvalidHandle { handle: String },
}

impl DriverError {
    /// Creates an error from a status code.
    pub fn from_status(status: DriverStatus) -> Self {
        match status {
            DriverStatus::NotSupported => DriverError::NotSupported {
                feature: "unknown".to_string(),
            },
            DriverStatus::InvalidParameter => DriverError::InvalidParameter {
                message: format!("backend returned {}", status),
            },
            DriverStatus::ItemNotFound => DriverError::NotFound {
                item: "unknown".to_string(),
            },
            DriverStatus::ItemAlreadyExists => DriverError::AlreadyExists {
                item: "unknown".to_string(),
            },
            DriverStatus::InvalidHandle => DriverError::InvalidHandle {
                handle: "unknown".to_string(),
            },
            _ => DriverError::Status { status },
        }
    }

    pub fn not_supported(feature: impl Into<String>) -> Self {
        DriverError::NotSupported {
            feature: feature.into(),
        }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        DriverError::InvalidParameter {
            message: message.into(),
        }
    }

    pub fn not_found(item: impl Into<String>) -> Self {
        DriverError::NotFound { item: item.into() }
    }

    pub fn already_exists(item: impl Into<String>) -> Self {
        DriverError::AlreadyExists { item: item.into() }
    }

    pub fn invalid_handle(handle: impl fmt::Display) -> Self {
        DriverError::InvalidHandle {
            handle: handle.to_string(),
        }
    }

    /// Returns the status code equivalent of this error.
    pub fn status(&self) -> DriverStatus {
        match self {
            DriverError::Status { status } => *status,
            DriverError::NotSupported { .. } => DriverStatus::NotSupported,
            DriverError::InvalidParameter { .. } => DriverStatus::InvalidParameter,
            DriverError::NotFound { .. } => DriverStatus::ItemNotFound,
            DriverError::AlreadyExists { .. } => DriverStatus::ItemAlreadyExists,
            DriverError::InvalidHandle { .. } => DriverStatus::InvalidHandle,
        }
    }

    /// Returns true if the backend reported a missing item.
    pub fn is_not_found(&self) -> bool {
        self.status() == DriverStatus::ItemNotFound
    }

    /// Returns true if the backend reported an existing item.
    pub fn is_already_exists(&self) -> bool {
        self.status() == DriverStatus::ItemAlreadyExists
    }
}

/// Result type for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

/// Extension trait for converting raw backend return codes.
pub trait DriverStatusExt {
    /// Converts a raw status code to a Result.
    fn to_result(self) -> DriverResult<()>;
}

impl DriverStatusExt for i32 {
    fn to_result(self) -> DriverResult<()> {
        DriverStatus::from_raw(self).into_result()
    }
}

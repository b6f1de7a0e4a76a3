//! Tool-specific error types.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Category of a failed registration or invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// No operation is registered under the requested name.
    UnknownOperation,

    /// Arguments did not satisfy the operation's parameter schema.
    InvalidArguments,

    /// The handler returned an error or panicked.
    HandlerError,

    /// An operation with the same name is already registered.
    DuplicateOperation,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnknownOperation => "UnknownOperation",
            Self::InvalidArguments => "InvalidArguments",
            Self::HandlerError => "HandlerError",
            Self::DuplicateOperation => "DuplicateOperation",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while building the registry at startup.
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    /// The name is already taken; the earlier registration is kept.
    #[error("Operation already registered: {0}")]
    DuplicateOperation(String),

    /// The operation's own schema is malformed.
    #[error("Invalid schema for operation '{operation}': {reason}")]
    InvalidSchema { operation: String, reason: String },
}

impl RegistryError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::DuplicateOperation(_) => Some(ErrorKind::DuplicateOperation),
            Self::InvalidSchema { .. } => None,
        }
    }
}

/// Errors returned by operation handlers.
///
/// Messages name the external call that failed and never carry secrets.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// A call to an external system failed.
    #[error("{call} failed: {message}")]
    External { call: String, message: String },

    /// A local I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A path was rejected by the sandbox validator.
    #[error("Path security validation failed: {0}")]
    PathSecurity(#[from] crate::core::security::PathSecurityError),

    /// A referenced item does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The adapter is missing configuration or credentials.
    #[error("{0} is not configured")]
    NotConfigured(String),

    /// Any other failure with a human-readable explanation.
    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    /// Create a new "external call failed" error.
    pub fn external(call: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::External {
            call: call.into(),
            message: message.to_string(),
        }
    }

    /// Create a new "not found" error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new "not configured" error.
    pub fn not_configured(what: impl Into<String>) -> Self {
        Self::NotConfigured(what.into())
    }

    /// Create a new generic failure.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

//! RPC status codes and errors
//!
//! Every backend and client operation fails with a [`Status`]: a canonical
//! [`Code`] plus a message. `Code::NotFound` is the one status callers are
//! expected to branch on (a point read of a missing row).

use std::io;
use thiserror::Error;

/// Result type alias for backend and client operations
pub type Result<T> = std::result::Result<T, Status>;

/// Canonical status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    /// Entity (row, session, transaction, database) does not exist
    NotFound,
    /// Entity already exists
    AlreadyExists,
    /// Malformed request (bad SQL, unknown column, wrong arity)
    InvalidArgument,
    /// Request is valid but the target is in the wrong state
    FailedPrecondition,
    /// Transaction aborted, caller may retry
    Aborted,
    /// Backend bug or corrupted state
    Internal,
    /// Backend not reachable
    Unavailable,
}

impl Code {
    /// Canonical spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Code::NotFound => "NotFound",
            Code::AlreadyExists => "AlreadyExists",
            Code::InvalidArgument => "InvalidArgument",
            Code::FailedPrecondition => "FailedPrecondition",
            Code::Aborted => "Aborted",
            Code::Internal => "Internal",
            Code::Unavailable => "Unavailable",
        }
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by every RPC
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("code = {code} desc = {message}")]
pub struct Status {
    /// Canonical code
    pub code: Code,
    /// Human-readable description
    pub message: String,
}

impl Status {
    /// Create a status with an explicit code
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// `NotFound` status
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Code::NotFound, message)
    }

    /// `AlreadyExists` status
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(Code::AlreadyExists, message)
    }

    /// `InvalidArgument` status
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    /// `FailedPrecondition` status
    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(Code::FailedPrecondition, message)
    }

    /// `Aborted` status
    pub fn aborted(message: impl Into<String>) -> Self {
        Self::new(Code::Aborted, message)
    }

    /// `Internal` status
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }

    /// `Unavailable` status
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }

    /// Whether this is a "not found" status
    pub fn is_not_found(&self) -> bool {
        self.code == Code::NotFound
    }
}

/// Code of an error, as the client library exposes it
pub fn error_code(err: &Status) -> Code {
    err.code
}

impl From<io::Error> for Status {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => Status::unavailable(format!("backend storage missing: {}", e)),
            _ => Status::internal(format!("I/O error: {}", e)),
        }
    }
}

impl From<rmp_serde::encode::Error> for Status {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Status::internal(format!("catalog encode error: {}", e))
    }
}

impl From<rmp_serde::decode::Error> for Status {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Status::internal(format!("catalog decode error: {}", e))
    }
}

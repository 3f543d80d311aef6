//! Remote-session error types.

use std::io;
use thiserror::Error;

/// Error produced by a remote file session or its transport.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Remote path does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Remote path already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Remote refused the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Directory not empty.
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Transport connection could not be established. Covers dial,
    /// authentication, and session-open failures alike.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The remote spoke the protocol wrong, or reported a status this
    /// layer has no better mapping for.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// I/O error on the transport.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl RemoteError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create a PermissionDenied error.
    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    /// Create a Connect error.
    pub fn connect(msg: impl Into<String>) -> Self {
        Self::Connect(msg.into())
    }

    /// Create a Protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}

/// Result alias for remote-session operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

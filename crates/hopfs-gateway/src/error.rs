//! Gateway error taxonomy.

use std::io;

use hopfs_remote::RemoteError;
use thiserror::Error;

/// Errors surfaced to the file-manager protocol layer.
///
/// Connect and authentication failures both collapse into
/// [`GatewayError::PermissionDenied`] so callers cannot tell them apart.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Unknown host, login, or remote path segment.
    #[error("not found: {0}")]
    NotFound(String),

    /// Target is not mutable, or the session could not be acquired.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A staged chunk was missing or unreadable during a merge.
    #[error("missing chunk {index} of 0..={total}")]
    MissingChunk { index: u32, total: u32 },

    /// Remote I/O failure, passed through as-is.
    #[error(transparent)]
    Remote(RemoteError),

    /// Local staging or stream-copy I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl GatewayError {
    pub fn not_found(path: impl Into<String>) -> Self {
        GatewayError::NotFound(path.into())
    }

    pub fn permission_denied(path: impl Into<String>) -> Self {
        GatewayError::PermissionDenied(path.into())
    }
}

impl From<RemoteError> for GatewayError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::NotFound(p) => GatewayError::NotFound(p),
            RemoteError::PermissionDenied(p) => GatewayError::PermissionDenied(p),
            other => GatewayError::Remote(other),
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

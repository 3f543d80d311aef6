//! The remote file-session trait.
//!
//! Path-based and handle-free at the trait surface: every operation takes
//! the real remote path as a string, and streaming reads/writes hand back
//! boxed `AsyncRead`/`AsyncWrite` objects. The gateway owns path
//! translation; implementations see only real paths.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::RemoteResult;

/// Kind of a remote filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link (not followed by this layer).
    Symlink,
}

impl FileKind {
    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileKind::Directory)
    }
}

/// Metadata for one remote entry.
#[derive(Debug, Clone)]
pub struct FileStat {
    /// Size in bytes.
    pub size: u64,
    /// Entry kind.
    pub kind: FileKind,
    /// Unix permission bits (e.g. 0o644).
    pub mode: u32,
}

impl FileStat {
    /// Owner-readable per the mode bits.
    pub fn readable(&self) -> bool {
        self.mode & 0o400 != 0
    }

    /// Owner-writable per the mode bits.
    pub fn writable(&self) -> bool {
        self.mode & 0o200 != 0
    }
}

/// One entry of a remote directory listing.
#[derive(Debug, Clone)]
pub struct RemoteDirEntry {
    /// Entry name (not a full path).
    pub name: String,
    /// Entry kind.
    pub kind: FileKind,
}

/// How to open a remote file for writing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteFlags {
    /// Create the file if it does not exist.
    pub create: bool,
    /// Truncate on open.
    pub truncate: bool,
    /// Append to the end instead of writing at the start.
    pub append: bool,
}

impl WriteFlags {
    /// Create if missing, truncate if present.
    pub fn create_truncate() -> Self {
        Self {
            create: true,
            truncate: true,
            append: false,
        }
    }

    /// Create if missing, append at the end.
    pub fn create_append() -> Self {
        Self {
            create: true,
            truncate: false,
            append: true,
        }
    }
}

/// Boxed streaming reader over a remote file.
pub type RemoteReader = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed streaming writer into a remote file.
pub type RemoteWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A ready-to-use file session on one remote host under one login.
///
/// All remote I/O is blocking from the caller's point of view: each
/// method completes the whole round trip before returning. Callers that
/// need concurrency run operations on independent tasks.
#[async_trait]
pub trait RemoteFs: Send + Sync {
    /// Stat a remote path.
    async fn stat(&self, path: &str) -> RemoteResult<FileStat>;

    /// List a remote directory.
    async fn read_dir(&self, path: &str) -> RemoteResult<Vec<RemoteDirEntry>>;

    /// Open a remote file for reading.
    async fn open_read(&self, path: &str) -> RemoteResult<RemoteReader>;

    /// Open a remote file for writing.
    ///
    /// The returned writer must be shut down (`AsyncWriteExt::shutdown`)
    /// to surface close-time errors; dropping it mid-stream may leave a
    /// partial file on the remote.
    async fn open_write(&self, path: &str, flags: WriteFlags) -> RemoteResult<RemoteWriter>;

    /// Create an empty remote file and return its metadata.
    async fn create(&self, path: &str) -> RemoteResult<FileStat>;

    /// Create a remote directory, including missing parents.
    async fn mkdir_all(&self, path: &str) -> RemoteResult<()>;

    /// Rename a remote entry.
    async fn rename(&self, from: &str, to: &str) -> RemoteResult<()>;

    /// Remove a remote file.
    async fn remove_file(&self, path: &str) -> RemoteResult<()>;

    /// Remove an empty remote directory.
    async fn remove_dir(&self, path: &str) -> RemoteResult<()>;

    /// Check whether a remote path exists.
    async fn exists(&self, path: &str) -> bool {
        self.stat(path).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_bits() {
        let stat = FileStat {
            size: 0,
            kind: FileKind::File,
            mode: 0o644,
        };
        assert!(stat.readable());
        assert!(stat.writable());

        let ro = FileStat {
            size: 0,
            kind: FileKind::File,
            mode: 0o444,
        };
        assert!(ro.readable());
        assert!(!ro.writable());
    }

    #[test]
    fn test_write_flags() {
        let f = WriteFlags::create_truncate();
        assert!(f.create && f.truncate && !f.append);

        let a = WriteFlags::create_append();
        assert!(a.create && a.append && !a.truncate);
    }
}

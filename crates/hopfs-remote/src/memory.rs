//! In-memory remote filesystem and connector.
//!
//! The fake counterpart of the SFTP transport: a [`MemoryRemoteFs`] holds
//! one host+login's filesystem in a `HashMap`, and a [`MemoryConnector`]
//! hands out transports over shared instances of it while counting
//! connects and recycles. Used by the gateway's tests and by local demos;
//! all data is lost on drop.

use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWrite;

use hopfs_types::{HostInfo, LoginInfo};

use crate::connect::{RemoteConnector, RemoteTransport};
use crate::error::{RemoteError, RemoteResult};
use crate::fs::{
    FileKind, FileStat, RemoteDirEntry, RemoteFs, RemoteReader, RemoteWriter, WriteFlags,
};

#[derive(Debug, Clone)]
enum Entry {
    File { data: Vec<u8>, mode: u32 },
    Dir { mode: u32 },
}

impl Entry {
    fn stat(&self) -> FileStat {
        match self {
            Entry::File { data, mode } => FileStat {
                size: data.len() as u64,
                kind: FileKind::File,
                mode: *mode,
            },
            Entry::Dir { mode } => FileStat {
                size: 0,
                kind: FileKind::Directory,
                mode: *mode,
            },
        }
    }
}

type Entries = Arc<RwLock<HashMap<String, Entry>>>;

/// In-memory [`RemoteFs`].
///
/// Thread-safe via an internal `RwLock`; cloning shares the same
/// filesystem.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemoteFs {
    entries: Entries,
}

/// Normalize a path: collapse separators, resolve `.` and `..`, keep the
/// leading slash if present. `"/"` and `""` both normalize to `"/"`.
fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    if parts.is_empty() {
        return "/".to_string();
    }
    if absolute {
        format!("/{}", parts.join("/"))
    } else {
        parts.join("/")
    }
}

/// Parent of a normalized path, if it has one.
fn parent_of(path: &str) -> Option<String> {
    if path == "/" {
        return None;
    }
    match path.rsplit_once('/') {
        Some(("", _)) => Some("/".to_string()),
        Some((dir, _)) => Some(dir.to_string()),
        None => None,
    }
}

impl MemoryRemoteFs {
    /// New empty filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file, creating parent directories.
    pub fn seed_file(&self, path: &str, data: &[u8]) {
        let path = normalize(path);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        ensure_parents(&mut entries, &path);
        entries.insert(
            path,
            Entry::File {
                data: data.to_vec(),
                mode: 0o644,
            },
        );
    }

    /// Seed a directory, creating parents.
    pub fn seed_dir(&self, path: &str) {
        let path = normalize(path);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        ensure_parents(&mut entries, &path);
        entries.insert(path, Entry::Dir { mode: 0o755 });
    }

    /// Current contents of a file, for test assertions.
    pub fn file_contents(&self, path: &str) -> Option<Vec<u8>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        match entries.get(&normalize(path)) {
            Some(Entry::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }
}

fn ensure_parents(entries: &mut HashMap<String, Entry>, path: &str) {
    let mut current = String::new();
    let absolute = path.starts_with('/');
    for part in path.trim_start_matches('/').split('/') {
        if part.is_empty() {
            continue;
        }
        if current.is_empty() {
            current = if absolute {
                format!("/{part}")
            } else {
                part.to_string()
            };
        } else if current == "/" {
            current = format!("/{part}");
        } else {
            current = format!("{current}/{part}");
        }
        if current == path {
            break;
        }
        entries
            .entry(current.clone())
            .or_insert(Entry::Dir { mode: 0o755 });
    }
}

#[async_trait]
impl RemoteFs for MemoryRemoteFs {
    async fn stat(&self, path: &str) -> RemoteResult<FileStat> {
        let path = normalize(path);
        if path == "/" {
            return Ok(FileStat {
                size: 0,
                kind: FileKind::Directory,
                mode: 0o755,
            });
        }
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&path)
            .map(Entry::stat)
            .ok_or_else(|| RemoteError::not_found(path))
    }

    async fn read_dir(&self, path: &str) -> RemoteResult<Vec<RemoteDirEntry>> {
        let path = normalize(path);
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        if path != "/" {
            match entries.get(&path) {
                Some(Entry::Dir { .. }) => {}
                Some(_) => return Err(RemoteError::not_a_directory(path)),
                None => return Err(RemoteError::not_found(path)),
            }
        }
        let mut result: Vec<RemoteDirEntry> = entries
            .iter()
            .filter(|(k, _)| parent_of(k).as_deref() == Some(path.as_str()))
            .map(|(k, v)| RemoteDirEntry {
                name: k.rsplit('/').next().unwrap_or(k).to_string(),
                kind: v.stat().kind,
            })
            .collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    async fn open_read(&self, path: &str) -> RemoteResult<RemoteReader> {
        let path = normalize(path);
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        match entries.get(&path) {
            Some(Entry::File { data, .. }) => Ok(Box::new(io::Cursor::new(data.clone()))),
            Some(Entry::Dir { .. }) => Err(RemoteError::is_a_directory(path)),
            None => Err(RemoteError::not_found(path)),
        }
    }

    async fn open_write(&self, path: &str, flags: WriteFlags) -> RemoteResult<RemoteWriter> {
        let path = normalize(path);
        let mut buf = Vec::new();
        {
            let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
            match entries.get(&path) {
                Some(Entry::Dir { .. }) => return Err(RemoteError::is_a_directory(path)),
                Some(Entry::File { data, .. }) => {
                    if flags.append {
                        buf = data.clone();
                    }
                }
                None => {
                    if !flags.create {
                        return Err(RemoteError::not_found(path));
                    }
                    ensure_parents(&mut entries, &path);
                }
            }
        }
        Ok(Box::new(MemoryWriter {
            path,
            buf,
            entries: Arc::clone(&self.entries),
            committed: false,
        }))
    }

    async fn create(&self, path: &str) -> RemoteResult<FileStat> {
        let path = normalize(path);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(Entry::Dir { .. }) = entries.get(&path) {
            return Err(RemoteError::is_a_directory(path));
        }
        ensure_parents(&mut entries, &path);
        let entry = Entry::File {
            data: Vec::new(),
            mode: 0o644,
        };
        let stat = entry.stat();
        entries.insert(path, entry);
        Ok(stat)
    }

    async fn mkdir_all(&self, path: &str) -> RemoteResult<()> {
        let path = normalize(path);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(Entry::File { .. }) = entries.get(&path) {
            return Err(RemoteError::not_a_directory(path));
        }
        ensure_parents(&mut entries, &path);
        entries.entry(path).or_insert(Entry::Dir { mode: 0o755 });
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> RemoteResult<()> {
        let from = normalize(from);
        let to = normalize(to);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let entry = entries
            .remove(&from)
            .ok_or_else(|| RemoteError::not_found(from.clone()))?;
        if matches!(entry, Entry::Dir { .. }) {
            // Move children along with the directory.
            let prefix = format!("{from}/");
            let children: Vec<String> = entries
                .keys()
                .filter(|k| k.starts_with(&prefix))
                .cloned()
                .collect();
            for child in children {
                if let Some(child_entry) = entries.remove(&child) {
                    let suffix = &child[prefix.len()..];
                    entries.insert(format!("{to}/{suffix}"), child_entry);
                }
            }
        }
        entries.insert(to, entry);
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> RemoteResult<()> {
        let path = normalize(path);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        match entries.get(&path) {
            Some(Entry::File { .. }) => {
                entries.remove(&path);
                Ok(())
            }
            Some(Entry::Dir { .. }) => Err(RemoteError::is_a_directory(path)),
            None => Err(RemoteError::not_found(path)),
        }
    }

    async fn remove_dir(&self, path: &str) -> RemoteResult<()> {
        let path = normalize(path);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        match entries.get(&path) {
            Some(Entry::Dir { .. }) => {}
            Some(_) => return Err(RemoteError::not_a_directory(path.clone())),
            None => return Err(RemoteError::not_found(path.clone())),
        }
        let prefix = format!("{path}/");
        if entries.keys().any(|k| k.starts_with(&prefix)) {
            return Err(RemoteError::DirectoryNotEmpty(path));
        }
        entries.remove(&path);
        Ok(())
    }
}

/// Writer that commits its buffer into the shared map.
///
/// Commits on shutdown; a drop without shutdown also commits, mirroring a
/// real remote where already-streamed bytes stay written.
struct MemoryWriter {
    path: String,
    buf: Vec<u8>,
    entries: Entries,
    committed: bool,
}

impl MemoryWriter {
    fn commit(&mut self) {
        if self.committed {
            return;
        }
        self.committed = true;
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let mode = match entries.get(&self.path) {
            Some(Entry::File { mode, .. }) => *mode,
            _ => 0o644,
        };
        entries.insert(
            self.path.clone(),
            Entry::File {
                data: std::mem::take(&mut self.buf),
                mode,
            },
        );
    }
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<Result<usize, io::Error>> {
        self.buf.extend_from_slice(data);
        Poll::Ready(Ok(data.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Result<(), io::Error>> {
        self.commit();
        Poll::Ready(Ok(()))
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        self.commit();
    }
}

/// Connector over shared [`MemoryRemoteFs`] instances, one per
/// (hostname, login-name) pair. Counts connects and recycles so tests can
/// assert on session-pool behavior.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    filesystems: Mutex<HashMap<(String, String), MemoryRemoteFs>>,
    connects: AtomicUsize,
    recycles: Arc<AtomicUsize>,
    refuse: AtomicBool,
}

impl MemoryConnector {
    /// New connector with no filesystems.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filesystem backing (hostname, login), created on first use.
    ///
    /// Tests call this to seed files before the gateway connects.
    pub fn fs_for(&self, hostname: &str, login: &str) -> MemoryRemoteFs {
        let mut map = self.filesystems.lock().unwrap_or_else(|e| e.into_inner());
        map.entry((hostname.to_string(), login.to_string()))
            .or_default()
            .clone()
    }

    /// Number of successful connects so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Number of transports recycled so far.
    pub fn recycle_count(&self) -> usize {
        self.recycles.load(Ordering::SeqCst)
    }

    /// Make subsequent connects fail (to exercise permission mapping).
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteConnector for MemoryConnector {
    async fn connect(
        &self,
        _user: &str,
        host: &HostInfo,
        login: &LoginInfo,
        _timeout: Duration,
    ) -> RemoteResult<Box<dyn RemoteTransport>> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(RemoteError::connect(format!(
                "{}@{} refused",
                login.username(),
                host.hostname
            )));
        }
        let fs = self.fs_for(&host.hostname, &login.name);
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryTransport {
            fs,
            recycles: Arc::clone(&self.recycles),
            recycled: AtomicBool::new(false),
        }))
    }
}

struct MemoryTransport {
    fs: MemoryRemoteFs,
    recycles: Arc<AtomicUsize>,
    recycled: AtomicBool,
}

#[async_trait]
impl RemoteTransport for MemoryTransport {
    async fn open_fs(&self) -> RemoteResult<Arc<dyn RemoteFs>> {
        Ok(Arc::new(self.fs.clone()))
    }

    async fn recycle(&self) {
        if !self.recycled.swap(true, Ordering::SeqCst) {
            self.recycles.fetch_add(1, Ordering::SeqCst);
        }
    }
}

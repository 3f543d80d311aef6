//! SSH/SFTP transport built on `russh` + `russh-sftp`.
//!
//! [`SftpConnector`] dials a host and authenticates one login identity;
//! the resulting [`RemoteTransport`] lazily opens the SFTP subsystem and
//! exposes it as a [`RemoteFs`]. Recycling a transport disconnects the
//! underlying SSH session.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client;
use russh::keys::ssh_key;
use russh::keys::{load_secret_key, PrivateKey, PrivateKeyWithHashAlg};
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::{FileType, OpenFlags, StatusCode};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, OnceCell};

use hopfs_types::{AuthMethod, HostInfo, LoginInfo};

use crate::connect::{RemoteConnector, RemoteTransport};
use crate::error::{RemoteError, RemoteResult};
use crate::fs::{
    FileKind, FileStat, RemoteDirEntry, RemoteFs, RemoteReader, RemoteWriter, WriteFlags,
};

/// Inactivity timeout for established SSH sessions.
const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(300);

/// Default key files tried when a login uses [`AuthMethod::DefaultKeys`].
const DEFAULT_KEY_NAMES: [&str; 3] = ["id_ed25519", "id_rsa", "id_ecdsa"];

/// Connector that dials hosts over SSH and authenticates per login.
#[derive(Debug, Default)]
pub struct SftpConnector;

impl SftpConnector {
    pub fn new() -> Self {
        Self
    }
}

/// Accepts any server host key.
///
/// The gateway dials hosts from a trusted inventory, so host keys are
/// not pinned here. TODO: optional known_hosts pinning for inventories
/// that carry expected keys.
struct AcceptingHandler {
    hostname: String,
}

impl client::Handler for AcceptingHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        tracing::debug!(host = %self.hostname, "accepting server host key");
        Ok(true)
    }
}

#[async_trait]
impl RemoteConnector for SftpConnector {
    async fn connect(
        &self,
        user: &str,
        host: &HostInfo,
        login: &LoginInfo,
        timeout: Duration,
    ) -> RemoteResult<Box<dyn RemoteTransport>> {
        let config = Arc::new(client::Config {
            inactivity_timeout: Some(INACTIVITY_TIMEOUT),
            ..Default::default()
        });
        let handler = AcceptingHandler {
            hostname: host.hostname.clone(),
        };

        let addr = (host.address.as_str(), host.port);
        let mut session = tokio::time::timeout(timeout, client::connect(config, addr, handler))
            .await
            .map_err(|_| {
                RemoteError::connect(format!(
                    "{}:{} timed out after {}s",
                    host.address,
                    host.port,
                    timeout.as_secs()
                ))
            })?
            .map_err(|e| RemoteError::connect(format!("{}:{}: {e}", host.address, host.port)))?;

        let username = login.username();
        let authed = match &login.auth {
            AuthMethod::Password { password } => session
                .authenticate_password(username, password.as_str())
                .await
                .map_err(|e| RemoteError::connect(format!("{username}@{}: {e}", host.hostname)))?
                .success(),
            AuthMethod::KeyFile { path } => {
                let key = load_secret_key(expand_tilde(path), None).map_err(|e| {
                    RemoteError::connect(format!("load key {path}: {e}"))
                })?;
                try_publickey(&mut session, username, &host.hostname, key).await?
            }
            AuthMethod::DefaultKeys => {
                let mut ok = false;
                for key in default_keys() {
                    if try_publickey(&mut session, username, &host.hostname, key).await? {
                        ok = true;
                        break;
                    }
                }
                ok
            }
        };
        if !authed {
            return Err(RemoteError::connect(format!(
                "authentication failed for {username}@{}",
                host.hostname
            )));
        }

        tracing::info!(
            user,
            host = %host.hostname,
            login = %login.name,
            "ssh session established"
        );
        Ok(Box::new(SftpTransport {
            inner: Mutex::new(Inner {
                handle: Some(session),
                fs: None,
            }),
        }))
    }
}

async fn try_publickey(
    session: &mut client::Handle<AcceptingHandler>,
    username: &str,
    hostname: &str,
    key: PrivateKey,
) -> RemoteResult<bool> {
    let hash_alg = session
        .best_supported_rsa_hash()
        .await
        .map_err(|e| RemoteError::connect(format!("{username}@{hostname}: {e}")))?
        .flatten();
    let result = session
        .authenticate_publickey(username, PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg))
        .await
        .map_err(|e| RemoteError::connect(format!("{username}@{hostname}: {e}")))?;
    Ok(result.success())
}

/// Loadable keys from the default `~/.ssh` locations.
fn default_keys() -> Vec<PrivateKey> {
    let Some(home) = dirs::home_dir() else {
        return Vec::new();
    };
    let mut keys = Vec::new();
    for name in DEFAULT_KEY_NAMES {
        let path = home.join(".ssh").join(name);
        if path.exists() {
            match load_secret_key(&path, None) {
                Ok(key) => keys.push(key),
                Err(e) => tracing::debug!("skipping {}: {e}", path.display()),
            }
        }
    }
    keys
}

fn expand_tilde(raw: &str) -> PathBuf {
    if raw == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

struct Inner {
    handle: Option<client::Handle<AcceptingHandler>>,
    fs: Option<Arc<dyn RemoteFs>>,
}

/// One authenticated SSH session with a lazily opened SFTP subsystem.
pub struct SftpTransport {
    inner: Mutex<Inner>,
}

#[async_trait]
impl RemoteTransport for SftpTransport {
    async fn open_fs(&self) -> RemoteResult<Arc<dyn RemoteFs>> {
        let mut inner = self.inner.lock().await;
        if let Some(fs) = &inner.fs {
            return Ok(Arc::clone(fs));
        }
        let handle = inner
            .handle
            .as_ref()
            .ok_or_else(|| RemoteError::connect("session already recycled"))?;
        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| RemoteError::connect(format!("open channel: {e}")))?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| RemoteError::connect(format!("request sftp subsystem: {e}")))?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| RemoteError::protocol(format!("sftp session init: {e}")))?;
        let fs: Arc<dyn RemoteFs> = Arc::new(SftpRemoteFs {
            sftp,
            home: OnceCell::new(),
        });
        inner.fs = Some(Arc::clone(&fs));
        Ok(fs)
    }

    async fn recycle(&self) {
        let mut inner = self.inner.lock().await;
        inner.fs = None;
        if let Some(handle) = inner.handle.take() {
            let _ = handle
                .disconnect(russh::Disconnect::ByApplication, "closing", "en")
                .await;
        }
    }
}

/// [`RemoteFs`] over one SFTP subsystem channel.
///
/// `~`-prefixed paths are resolved against the login's home directory,
/// canonicalized once per session.
pub struct SftpRemoteFs {
    sftp: SftpSession,
    home: OnceCell<String>,
}

impl SftpRemoteFs {
    async fn resolve(&self, path: &str) -> RemoteResult<String> {
        if path != "~" && !path.starts_with("~/") {
            return Ok(path.to_string());
        }
        let home = self
            .home
            .get_or_try_init(|| async {
                self.sftp
                    .canonicalize(".")
                    .await
                    .map_err(|e| map_sftp_err(".", &e))
            })
            .await?;
        Ok(join_home(home, path))
    }
}

/// Splice a `~`-prefixed path onto the canonicalized home directory.
fn join_home(home: &str, path: &str) -> String {
    let home = home.trim_end_matches('/');
    match path.strip_prefix("~/") {
        Some(rest) if !rest.is_empty() => format!("{home}/{rest}"),
        _ => home.to_string(),
    }
}

fn map_sftp_err(path: &str, e: &SftpError) -> RemoteError {
    if let SftpError::Status(status) = e {
        match status.status_code {
            StatusCode::NoSuchFile => return RemoteError::not_found(path),
            StatusCode::PermissionDenied => return RemoteError::permission_denied(path),
            _ => {}
        }
    }
    RemoteError::protocol(format!("{path}: {e}"))
}

fn kind_of(file_type: FileType) -> FileKind {
    if file_type.is_dir() {
        FileKind::Directory
    } else if file_type.is_symlink() {
        FileKind::Symlink
    } else {
        FileKind::File
    }
}

#[async_trait]
impl RemoteFs for SftpRemoteFs {
    async fn stat(&self, path: &str) -> RemoteResult<FileStat> {
        let path = self.resolve(path).await?;
        let attrs = self
            .sftp
            .metadata(&path)
            .await
            .map_err(|e| map_sftp_err(&path, &e))?;
        let kind = kind_of(attrs.file_type());
        Ok(FileStat {
            size: attrs.size.unwrap_or(0),
            kind,
            mode: attrs.permissions.map(|p| p & 0o7777).unwrap_or(0o644),
        })
    }

    async fn read_dir(&self, path: &str) -> RemoteResult<Vec<RemoteDirEntry>> {
        let path = self.resolve(path).await?;
        let entries = self
            .sftp
            .read_dir(&path)
            .await
            .map_err(|e| map_sftp_err(&path, &e))?;
        let mut result = Vec::new();
        for entry in entries {
            let name = entry.file_name();
            if name == "." || name == ".." {
                continue;
            }
            result.push(RemoteDirEntry {
                kind: kind_of(entry.metadata().file_type()),
                name,
            });
        }
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    async fn open_read(&self, path: &str) -> RemoteResult<RemoteReader> {
        let path = self.resolve(path).await?;
        let file = self
            .sftp
            .open_with_flags(&path, OpenFlags::READ)
            .await
            .map_err(|e| map_sftp_err(&path, &e))?;
        Ok(Box::new(file))
    }

    async fn open_write(&self, path: &str, flags: WriteFlags) -> RemoteResult<RemoteWriter> {
        let path = self.resolve(path).await?;
        let mut open_flags = OpenFlags::WRITE;
        if flags.create {
            open_flags |= OpenFlags::CREATE;
        }
        if flags.truncate {
            open_flags |= OpenFlags::TRUNCATE;
        }
        if flags.append {
            open_flags |= OpenFlags::APPEND;
        }
        let file = self
            .sftp
            .open_with_flags(&path, open_flags)
            .await
            .map_err(|e| map_sftp_err(&path, &e))?;
        Ok(Box::new(file))
    }

    async fn create(&self, path: &str) -> RemoteResult<FileStat> {
        let path = self.resolve(path).await?;
        let mut file = self
            .sftp
            .open_with_flags(
                &path,
                OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE,
            )
            .await
            .map_err(|e| map_sftp_err(&path, &e))?;
        file.shutdown()
            .await
            .map_err(|e| RemoteError::protocol(format!("{path}: {e}")))?;
        self.stat(&path).await
    }

    async fn mkdir_all(&self, path: &str) -> RemoteResult<()> {
        let path = self.resolve(path).await?;
        let mut current = String::new();
        for component in path.split('/') {
            if component.is_empty() {
                current.push('/');
                continue;
            }
            if current.is_empty() || current == "/" {
                current = format!("{current}{component}");
            } else {
                current = format!("{current}/{component}");
            }
            match self.sftp.create_dir(&current).await {
                Ok(()) => {}
                // Failure usually means the directory exists; verify.
                Err(SftpError::Status(s)) if s.status_code == StatusCode::Failure => {
                    self.sftp
                        .metadata(&current)
                        .await
                        .map_err(|e| map_sftp_err(&current, &e))?;
                }
                Err(e) => return Err(map_sftp_err(&current, &e)),
            }
        }
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> RemoteResult<()> {
        let from = self.resolve(from).await?;
        let to = self.resolve(to).await?;
        self.sftp
            .rename(&from, &to)
            .await
            .map_err(|e| map_sftp_err(&from, &e))
    }

    async fn remove_file(&self, path: &str) -> RemoteResult<()> {
        let path = self.resolve(path).await?;
        self.sftp
            .remove_file(&path)
            .await
            .map_err(|e| map_sftp_err(&path, &e))
    }

    async fn remove_dir(&self, path: &str) -> RemoteResult<()> {
        let path = self.resolve(path).await?;
        self.sftp
            .remove_dir(&path)
            .await
            .map_err(|e| map_sftp_err(&path, &e))
    }
}

//! The volume facade: the thirteen file-manager operations.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWriteExt};

use hopfs_remote::{FileStat, Inventory, RemoteConnector, RemoteFs, RemoteReader, WriteFlags};
use hopfs_types::{EntryKind, VolumeEntry, ident};

use crate::chunks::ChunkAssembler;
use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::translate::join_real;
use crate::tree::{HierarchyTree, LoginNode, Resolved, normalize};

/// One user's unified view over their entitled hosts.
///
/// Created per file-manager session; holds the hierarchy tree, the
/// lazily connected login sessions, and the chunk staging area. All
/// mutating operations are rejected at or above the login level; only
/// paths inside a login's remote filesystem are writable.
pub struct Volume {
    id: String,
    user: String,
    config: GatewayConfig,
    tree: HierarchyTree,
    connector: Arc<dyn RemoteConnector>,
    chunks: ChunkAssembler,
}

impl Volume {
    /// Build a volume for `user` connecting from `client_addr`.
    ///
    /// Queries the inventory exactly once and bootstraps the local
    /// staging directory.
    pub async fn new(
        user: &str,
        client_addr: &str,
        inventory: &dyn Inventory,
        connector: Arc<dyn RemoteConnector>,
        config: GatewayConfig,
    ) -> GatewayResult<Self> {
        let id = ident::volume_id(user, client_addr);
        let hosts = inventory.entitled_hosts(user, "1").await?;
        tracing::info!(user, volume = %id, hosts = hosts.len(), "volume created");
        let tree = HierarchyTree::new(&config.root_name, config.effective_remote_root(), hosts);
        let staging = config.staging_dir.join(&id);
        tokio::fs::create_dir_all(&staging).await?;
        Ok(Self {
            id,
            user: user.to_string(),
            config,
            tree,
            connector,
            chunks: ChunkAssembler::new(staging),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root_path(&self) -> &str {
        self.tree.root_path()
    }

    /// Entry metadata for any virtual path.
    pub async fn info(&self, path: &str) -> GatewayResult<VolumeEntry> {
        match self.tree.resolve(path).await? {
            Resolved::Root => Ok(self.root_entry()),
            Resolved::Host(host) => Ok(self.dir_entry(&host.path)),
            Resolved::Login(login) => Ok(self.dir_entry(&login.path)),
            Resolved::Remote {
                login,
                virtual_path,
                real_path,
            } => {
                let fs = self.session(&login).await?;
                let stat = fs.stat(&real_path).await?;
                Ok(self.remote_entry(&virtual_path, &stat))
            }
        }
    }

    /// Children of a virtual directory. Degrades to empty on failure.
    pub async fn list(&self, path: &str) -> Vec<VolumeEntry> {
        match self.try_list(path).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path, "listing degraded to empty: {e}");
                Vec::new()
            }
        }
    }

    async fn try_list(&self, path: &str) -> GatewayResult<Vec<VolumeEntry>> {
        match self.tree.resolve(path).await? {
            Resolved::Root => Ok(self
                .tree
                .hosts()
                .iter()
                .map(|h| self.dir_entry(&h.path))
                .collect()),
            Resolved::Host(host) => Ok(host
                .logins()
                .await
                .iter()
                .map(|l| self.dir_entry(&l.path))
                .collect()),
            Resolved::Login(login) => {
                let virtual_dir = login.path.clone();
                let real_dir = login.real_root.clone();
                self.list_remote(&login, &virtual_dir, &real_dir).await
            }
            Resolved::Remote {
                login,
                virtual_path,
                real_path,
            } => self.list_remote(&login, &virtual_path, &real_path).await,
        }
    }

    async fn list_remote(
        &self,
        login: &Arc<LoginNode>,
        virtual_dir: &str,
        real_dir: &str,
    ) -> GatewayResult<Vec<VolumeEntry>> {
        let fs = self.session(login).await?;
        let mut entries = Vec::new();
        for child in fs.read_dir(real_dir).await? {
            let child_virtual = format!("{virtual_dir}/{}", child.name);
            match fs.stat(&join_real(real_dir, &child.name)).await {
                Ok(stat) => entries.push(self.remote_entry(&child_virtual, &stat)),
                Err(e) => tracing::debug!(path = %child_virtual, "skipping entry: {e}"),
            }
        }
        Ok(entries)
    }

    /// Ancestor entries for breadcrumb and tree UIs: for every prefix of
    /// `path` from the root down to the target's parent, the ancestor's
    /// own info followed by its directory children. The target itself
    /// surfaces as a child of its parent and is never listed. `depth`
    /// bounds the walk to the deepest N ancestors (0 = unbounded).
    /// Unresolvable ancestors are skipped silently.
    pub async fn parents(&self, path: &str, depth: usize) -> Vec<VolumeEntry> {
        let path = normalize(path);
        let root = self.tree.root_path();
        let mut ancestors = vec![root.to_string()];
        if let Some(rest) = path.strip_prefix(&format!("{root}/")) {
            let parts: Vec<&str> = rest.split('/').collect();
            let mut current = root.to_string();
            for part in &parts[..parts.len().saturating_sub(1)] {
                current = format!("{current}/{part}");
                ancestors.push(current.clone());
            }
        }
        if depth != 0 && ancestors.len() > depth {
            let skip = ancestors.len() - depth;
            ancestors.drain(..skip);
        }

        let mut entries = Vec::new();
        for ancestor in ancestors {
            match self.info(&ancestor).await {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::debug!(path = %ancestor, "skipping ancestor: {e}");
                    continue;
                }
            }
            entries.extend(
                self.list(&ancestor)
                    .await
                    .into_iter()
                    .filter(|e| e.kind.is_dir()),
            );
        }
        entries
    }

    /// Open a read stream on a remote file.
    pub async fn get_file(&self, path: &str) -> GatewayResult<RemoteReader> {
        match self.tree.resolve(path).await? {
            Resolved::Remote {
                login, real_path, ..
            } => {
                let fs = self.session(&login).await?;
                Ok(fs.open_read(&real_path).await?)
            }
            _ => Err(GatewayError::permission_denied(path)),
        }
    }

    /// Stream a whole file into `dir/filename`, overwriting.
    pub async fn upload(
        &self,
        dir: &str,
        filename: &str,
        mut reader: impl AsyncRead + Unpin,
    ) -> GatewayResult<VolumeEntry> {
        let (login, virtual_dir, real_dir) = self.writable_dir(dir).await?;
        let fs = self.session(&login).await?;
        let dest = join_real(&real_dir, filename);
        let mut writer = fs.open_write(&dest, WriteFlags::create_truncate()).await?;
        let written = tokio::io::copy(&mut reader, &mut writer).await?;
        writer.shutdown().await?;
        tracing::info!(user = %self.user, path = %dest, written, "uploaded file");
        self.info(&join_virtual(&virtual_dir, filename)).await
    }

    /// Stage one chunk of a chunked upload on local storage.
    pub async fn upload_chunk(
        &self,
        upload_id: u64,
        dir: &str,
        chunk_name: &str,
        mut reader: impl AsyncRead + Unpin,
    ) -> GatewayResult<()> {
        self.chunks
            .stage(dir, chunk_name, upload_id, &mut reader)
            .await?;
        Ok(())
    }

    /// True iff every chunk of the upload is staged.
    pub async fn complete_chunk(
        &self,
        upload_id: u64,
        total: u32,
        dir: &str,
        filename: &str,
    ) -> bool {
        self.chunks.is_complete(dir, filename, total, upload_id).await
    }

    /// Reassemble a staged chunk set into the remote `dir/filename`.
    ///
    /// A failed merge leaves the destination holding whatever prefix was
    /// already appended; callers must discard or overwrite it.
    pub async fn merge_chunk(
        &self,
        upload_id: u64,
        total: u32,
        dir: &str,
        filename: &str,
    ) -> GatewayResult<VolumeEntry> {
        let (login, virtual_dir, real_dir) = self.writable_dir(dir).await?;
        let fs = self.session(&login).await?;
        let dest = join_real(&real_dir, filename);
        let mut writer = fs.open_write(&dest, WriteFlags::create_truncate()).await?;
        self.chunks
            .merge_into(dir, filename, total, upload_id, &mut writer)
            .await?;
        writer.shutdown().await?;
        self.info(&join_virtual(&virtual_dir, filename)).await
    }

    /// Create a directory (and any missing parents) under `dir`.
    pub async fn make_dir(&self, dir: &str, name: &str) -> GatewayResult<VolumeEntry> {
        let (login, virtual_dir, real_dir) = self.writable_dir(dir).await?;
        let fs = self.session(&login).await?;
        fs.mkdir_all(&join_real(&real_dir, name)).await?;
        self.info(&join_virtual(&virtual_dir, name)).await
    }

    /// Create an empty file under `dir`.
    pub async fn make_file(&self, dir: &str, name: &str) -> GatewayResult<VolumeEntry> {
        let (login, virtual_dir, real_dir) = self.writable_dir(dir).await?;
        let fs = self.session(&login).await?;
        fs.create(&join_real(&real_dir, name)).await?;
        self.info(&join_virtual(&virtual_dir, name)).await
    }

    /// Rename an entry in place, keeping its containing directory.
    pub async fn rename(&self, path: &str, new_name: &str) -> GatewayResult<VolumeEntry> {
        match self.tree.resolve(path).await? {
            Resolved::Remote {
                login,
                virtual_path,
                real_path,
            } => {
                let fs = self.session(&login).await?;
                let new_real = join_real(real_parent(&real_path), new_name);
                fs.rename(&real_path, &new_real).await?;
                let parent = virtual_parent(&virtual_path).unwrap_or(self.tree.root_path());
                self.info(&join_virtual(parent, new_name)).await
            }
            _ => Err(GatewayError::permission_denied(path)),
        }
    }

    /// Remove a remote file or (empty) directory.
    pub async fn remove(&self, path: &str) -> GatewayResult<()> {
        match self.tree.resolve(path).await? {
            Resolved::Remote {
                login, real_path, ..
            } => {
                let fs = self.session(&login).await?;
                let stat = fs.stat(&real_path).await?;
                if stat.kind.is_dir() {
                    fs.remove_dir(&real_path).await?;
                } else {
                    fs.remove_file(&real_path).await?;
                }
                Ok(())
            }
            _ => Err(GatewayError::permission_denied(path)),
        }
    }

    /// Stream-copy into `dir/filename`; if the name is taken, the
    /// conflict suffix is appended to the filename instead of
    /// overwriting.
    pub async fn paste(
        &self,
        dir: &str,
        filename: &str,
        suffix: &str,
        mut reader: impl AsyncRead + Unpin,
    ) -> GatewayResult<VolumeEntry> {
        let (login, virtual_dir, real_dir) = self.writable_dir(dir).await?;
        let fs = self.session(&login).await?;
        let mut name = filename.to_string();
        if fs.exists(&join_real(&real_dir, &name)).await {
            name = format!("{filename}{suffix}");
        }
        let mut writer = fs
            .open_write(&join_real(&real_dir, &name), WriteFlags::create_truncate())
            .await?;
        tokio::io::copy(&mut reader, &mut writer).await?;
        writer.shutdown().await?;
        self.info(&join_virtual(&virtual_dir, &name)).await
    }

    /// Release every open login session. Safe to call more than once.
    pub async fn close(&self) {
        for host in self.tree.hosts() {
            for login in host.built_logins() {
                login.release().await;
            }
        }
        tracing::info!(volume = %self.id, "volume closed");
    }

    async fn session(&self, login: &LoginNode) -> GatewayResult<Arc<dyn RemoteFs>> {
        login
            .acquire(
                self.connector.as_ref(),
                &self.user,
                self.config.connect_timeout(),
            )
            .await
    }

    /// Resolve a target directory for a mutating operation. Root and
    /// host paths are rejected; a login path means the login's remote
    /// root.
    async fn writable_dir(&self, dir: &str) -> GatewayResult<(Arc<LoginNode>, String, String)> {
        match self.tree.resolve(dir).await? {
            Resolved::Root | Resolved::Host(_) => Err(GatewayError::permission_denied(dir)),
            Resolved::Login(login) => {
                let virtual_dir = login.path.clone();
                let real_dir = login.real_root.clone();
                Ok((login, virtual_dir, real_dir))
            }
            Resolved::Remote {
                login,
                virtual_path,
                real_path,
            } => Ok((login, virtual_path, real_path)),
        }
    }

    fn entry_id(&self, path: &str) -> String {
        ident::encode(&self.id, path)
    }

    fn root_entry(&self) -> VolumeEntry {
        VolumeEntry::directory(
            self.tree.root_name(),
            self.entry_id(self.tree.root_path()),
            "",
            &self.id,
        )
        .locked()
    }

    fn dir_entry(&self, path: &str) -> VolumeEntry {
        let name = path.rsplit('/').next().unwrap_or(path);
        let parent_id = virtual_parent(path)
            .map(|p| self.entry_id(p))
            .unwrap_or_default();
        VolumeEntry::directory(name, self.entry_id(path), parent_id, &self.id)
    }

    fn remote_entry(&self, virtual_path: &str, stat: &FileStat) -> VolumeEntry {
        let name = virtual_path.rsplit('/').next().unwrap_or(virtual_path);
        VolumeEntry {
            name: name.to_string(),
            id: self.entry_id(virtual_path),
            parent_id: virtual_parent(virtual_path)
                .map(|p| self.entry_id(p))
                .unwrap_or_default(),
            volume_id: self.id.clone(),
            size: stat.size,
            kind: if stat.kind.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            },
            read: stat.readable(),
            write: stat.writable(),
            locked: false,
        }
    }
}

fn virtual_parent(path: &str) -> Option<&str> {
    match path.rsplit_once('/') {
        Some(("", _)) | None => None,
        Some((dir, _)) => Some(dir),
    }
}

fn join_virtual(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

fn real_parent(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

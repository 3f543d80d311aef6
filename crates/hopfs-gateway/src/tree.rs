//! Hierarchy tree: host and login nodes, and virtual-path resolution.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::OnceCell;

use hopfs_remote::{RemoteConnector, RemoteFs};
use hopfs_types::{HostInfo, LoginInfo};

use crate::error::{GatewayError, GatewayResult};
use crate::session::SessionSlot;
use crate::translate::translate;

/// Virtual directory for one remote host.
///
/// Login nodes are built lazily on first access to the host, so a volume
/// listing its root never pays for hosts the user does not descend into.
pub struct HostNode {
    /// Virtual path, `/{root}/{hostname}`.
    pub path: String,
    /// When this node was created.
    pub created_at: SystemTime,
    /// Host metadata from the inventory.
    pub host: HostInfo,
    remote_root: String,
    logins: OnceCell<HashMap<String, Arc<LoginNode>>>,
}

impl HostNode {
    fn new(root_path: &str, host: HostInfo, remote_root: &str) -> Self {
        Self {
            path: format!("{root_path}/{}", host.hostname),
            created_at: SystemTime::now(),
            host,
            remote_root: remote_root.to_string(),
            logins: OnceCell::new(),
        }
    }

    async fn login_map(&self) -> &HashMap<String, Arc<LoginNode>> {
        self.logins
            .get_or_init(|| async {
                tracing::debug!(host = %self.host.hostname, "building login map");
                let mut map = HashMap::new();
                for login in &self.host.logins {
                    let node = LoginNode {
                        path: format!("{}/{}", self.path, login.name),
                        real_root: self.remote_root.clone(),
                        login: login.clone(),
                        host: self.host.clone(),
                        session: SessionSlot::default(),
                    };
                    map.insert(login.name.clone(), Arc::new(node));
                }
                map
            })
            .await
    }

    /// Login node by identity name, building the map on first use.
    pub async fn login(&self, name: &str) -> Option<Arc<LoginNode>> {
        self.login_map().await.get(name).cloned()
    }

    /// All login nodes, in inventory order.
    pub async fn logins(&self) -> Vec<Arc<LoginNode>> {
        let map = self.login_map().await;
        self.host
            .logins
            .iter()
            .filter_map(|l| map.get(&l.name).cloned())
            .collect()
    }

    /// Login nodes already materialized, without triggering a build.
    pub fn built_logins(&self) -> Vec<Arc<LoginNode>> {
        self.logins
            .get()
            .map(|map| map.values().cloned().collect())
            .unwrap_or_default()
    }
}

/// Virtual directory for one login identity; the boundary between
/// virtual and real paths, and owner of the login's cached session.
pub struct LoginNode {
    /// Virtual path, `/{root}/{hostname}/{login}`.
    pub path: String,
    /// Real remote root substituted for the virtual prefix.
    pub real_root: String,
    /// Login identity metadata.
    pub login: LoginInfo,
    /// Owning host metadata.
    pub host: HostInfo,
    session: SessionSlot,
}

impl LoginNode {
    /// Cached file session, connecting on first use.
    pub async fn acquire(
        &self,
        connector: &dyn RemoteConnector,
        user: &str,
        timeout: Duration,
    ) -> GatewayResult<Arc<dyn RemoteFs>> {
        self.session
            .acquire(connector, user, &self.host, &self.login, timeout)
            .await
    }

    /// Recycle the cached session, if any.
    pub async fn release(&self) {
        self.session.release().await
    }

    /// Translate a virtual path under this node into a real path.
    pub fn real_path(&self, virtual_path: &str) -> String {
        translate(&self.path, &self.real_root, virtual_path)
    }
}

/// Outcome of resolving a virtual path.
pub enum Resolved {
    /// The virtual root itself.
    Root,
    /// Exactly a host node.
    Host(Arc<HostNode>),
    /// Exactly a login node (its synthetic root directory).
    Login(Arc<LoginNode>),
    /// A path strictly inside a login's remote filesystem.
    Remote {
        login: Arc<LoginNode>,
        /// Normalized virtual path, for re-encoding results.
        virtual_path: String,
        real_path: String,
    },
}

/// The three-level namespace, built once from inventory data.
pub struct HierarchyTree {
    root_path: String,
    root_name: String,
    hosts: Vec<Arc<HostNode>>,
}

impl HierarchyTree {
    /// Build the tree for one volume instance.
    pub fn new(root_name: &str, remote_root: &str, hosts: Vec<HostInfo>) -> Self {
        let root_path = format!("/{root_name}");
        let hosts = hosts
            .into_iter()
            .map(|h| Arc::new(HostNode::new(&root_path, h, remote_root)))
            .collect();
        Self {
            root_path,
            root_name: root_name.to_string(),
            hosts,
        }
    }

    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    /// Host nodes in inventory order.
    pub fn hosts(&self) -> &[Arc<HostNode>] {
        &self.hosts
    }

    pub fn find_host(&self, hostname: &str) -> Option<&Arc<HostNode>> {
        self.hosts.iter().find(|h| h.host.hostname == hostname)
    }

    /// Resolve a virtual path to its place in the hierarchy.
    ///
    /// Empty and `/` resolve to the root. Unknown host or login names
    /// fail with [`GatewayError::NotFound`].
    pub async fn resolve(&self, path: &str) -> GatewayResult<Resolved> {
        let path = normalize(path);
        if path == "/" || path == self.root_path {
            return Ok(Resolved::Root);
        }
        let prefix = format!("{}/", self.root_path);
        let rest = path
            .strip_prefix(&prefix)
            .ok_or_else(|| GatewayError::not_found(&path))?;

        let mut parts = rest.splitn(3, '/');
        let hostname = parts.next().unwrap_or_default();
        let host = self
            .find_host(hostname)
            .ok_or_else(|| GatewayError::not_found(&path))?;
        let Some(login_name) = parts.next() else {
            return Ok(Resolved::Host(Arc::clone(host)));
        };
        let login = host
            .login(login_name)
            .await
            .ok_or_else(|| GatewayError::not_found(&path))?;
        match parts.next() {
            None => Ok(Resolved::Login(login)),
            Some(_) => {
                let real_path = login.real_path(&path);
                tracing::debug!(virtual_path = %path, %real_path, "translated");
                Ok(Resolved::Remote {
                    login,
                    virtual_path: path,
                    real_path,
                })
            }
        }
    }
}

/// Strip trailing slashes; empty becomes `/`.
pub(crate) fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

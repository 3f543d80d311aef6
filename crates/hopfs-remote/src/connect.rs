//! Transport and inventory collaborator traits.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use hopfs_types::{HostInfo, LoginInfo};

use crate::error::RemoteResult;
use crate::fs::RemoteFs;

/// An established connection to one host under one login.
///
/// Produced by a [`RemoteConnector`]; owns the underlying transport until
/// [`RemoteTransport::recycle`] hands it back to the connector's pool.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Open a file session over this connection.
    async fn open_fs(&self) -> RemoteResult<Arc<dyn RemoteFs>>;

    /// Return the underlying connection to the connector for reuse.
    ///
    /// Idempotent: recycling an already-recycled transport is a no-op.
    async fn recycle(&self);
}

/// The transport collaborator: dials hosts and produces connections.
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    /// Establish a connection to `host` as `login`, on behalf of `user`.
    ///
    /// `timeout` bounds connection establishment only; operations on the
    /// resulting session are not individually bounded at this layer.
    async fn connect(
        &self,
        user: &str,
        host: &HostInfo,
        login: &LoginInfo,
        timeout: Duration,
    ) -> RemoteResult<Box<dyn RemoteTransport>>;
}

/// The inventory collaborator: which hosts a user may reach.
#[async_trait]
pub trait Inventory: Send + Sync {
    /// Entitled hosts for a user, each with its available logins.
    ///
    /// `filter` is an opaque selector passed through to the inventory
    /// backend; implementations may ignore it.
    async fn entitled_hosts(&self, user_id: &str, filter: &str) -> RemoteResult<Vec<HostInfo>>;
}

/// Fixed inventory, typically loaded from a config file.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    hosts: Vec<HostInfo>,
}

impl StaticInventory {
    /// Inventory serving the same host list to every user.
    pub fn new(hosts: Vec<HostInfo>) -> Self {
        Self { hosts }
    }
}

#[async_trait]
impl Inventory for StaticInventory {
    async fn entitled_hosts(&self, _user_id: &str, _filter: &str) -> RemoteResult<Vec<HostInfo>> {
        Ok(self.hosts.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_inventory() {
        let inv = StaticInventory::new(vec![
            HostInfo::new("web1", "10.0.0.5"),
            HostInfo::new("db1", "10.0.0.9"),
        ]);
        let hosts = inv.entitled_hosts("amy", "1").await.unwrap();
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts[0].hostname, "web1");
    }
}

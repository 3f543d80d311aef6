//! Per-login session cache.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use hopfs_remote::{RemoteConnector, RemoteFs, RemoteTransport};
use hopfs_types::{HostInfo, LoginInfo};

use crate::error::{GatewayError, GatewayResult};

struct ActiveSession {
    fs: Arc<dyn RemoteFs>,
    transport: Box<dyn RemoteTransport>,
}

/// Holds at most one live session for a login node.
///
/// First acquisition connects through the transport collaborator and
/// caches the file session; the mutex serializes concurrent first
/// touches so duplicate connections cannot be created. Connect and
/// session-open failures surface as permission denied.
#[derive(Default)]
pub(crate) struct SessionSlot {
    inner: Mutex<Option<ActiveSession>>,
}

impl SessionSlot {
    pub(crate) async fn acquire(
        &self,
        connector: &dyn RemoteConnector,
        user: &str,
        host: &HostInfo,
        login: &LoginInfo,
        timeout: Duration,
    ) -> GatewayResult<Arc<dyn RemoteFs>> {
        let mut slot = self.inner.lock().await;
        if let Some(session) = slot.as_ref() {
            return Ok(Arc::clone(&session.fs));
        }
        let location = format!("{}@{}", login.name, host.hostname);
        let transport = connector
            .connect(user, host, login, timeout)
            .await
            .map_err(|e| {
                tracing::warn!(user, %location, "connect failed: {e}");
                GatewayError::permission_denied(&location)
            })?;
        let fs = match transport.open_fs().await {
            Ok(fs) => fs,
            Err(e) => {
                tracing::warn!(user, %location, "open file session failed: {e}");
                transport.recycle().await;
                return Err(GatewayError::permission_denied(&location));
            }
        };
        tracing::info!(user, %location, "session established");
        *slot = Some(ActiveSession {
            fs: Arc::clone(&fs),
            transport,
        });
        Ok(fs)
    }

    /// Recycle the cached transport, if any. Safe to call repeatedly.
    pub(crate) async fn release(&self) {
        if let Some(session) = self.inner.lock().await.take() {
            session.transport.recycle().await;
        }
    }
}

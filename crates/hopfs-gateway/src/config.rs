//! Volume configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings shared by every volume a process creates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Display name of the virtual root directory.
    pub root_name: String,
    /// Remote root each login session starts from. `"~"` (or empty)
    /// means the login's home directory.
    pub remote_root: String,
    /// Local directory for staged upload chunks. Each volume stages
    /// under its own subdirectory keyed by volume id.
    pub staging_dir: PathBuf,
    /// SSH connect timeout, in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            root_name: "Home".to_string(),
            remote_root: "~".to_string(),
            staging_dir: std::env::temp_dir().join("hopfs"),
            connect_timeout_secs: 15,
        }
    }
}

impl GatewayConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Remote root with the empty-string alias resolved.
    pub fn effective_remote_root(&self) -> &str {
        if self.remote_root.is_empty() {
            "~"
        } else {
            &self.remote_root
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.root_name, "Home");
        assert_eq!(config.effective_remote_root(), "~");
        assert_eq!(config.connect_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_empty_remote_root_means_home() {
        let config = GatewayConfig {
            remote_root: String::new(),
            ..GatewayConfig::default()
        };
        assert_eq!(config.effective_remote_root(), "~");
    }
}

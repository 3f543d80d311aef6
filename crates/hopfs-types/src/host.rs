//! Inventory records: remote hosts and their login identities.

use serde::{Deserialize, Serialize};

/// How a login identity authenticates against its host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Try keys from the default locations (`~/.ssh/id_*`).
    #[default]
    DefaultKeys,
    /// Private key file at the given path.
    KeyFile { path: String },
    /// Password authentication.
    Password { password: String },
}

/// One login identity on a remote host.
///
/// `name` is the label shown in the virtual tree; `username` is the
/// account used on the wire (defaults to `name` when absent).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginInfo {
    pub name: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub auth: AuthMethod,
}

impl LoginInfo {
    /// New login with the default-keys auth method.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            username: None,
            auth: AuthMethod::DefaultKeys,
        }
    }

    /// Account name used for the remote connection.
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.name)
    }
}

/// One remote host a user is entitled to, with its available logins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostInfo {
    /// Hostname shown in the virtual tree. Unique per inventory.
    pub hostname: String,
    /// Network address to dial (host or host:port target).
    pub address: String,
    /// SSH port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Login identities available on this host.
    pub logins: Vec<LoginInfo>,
}

fn default_port() -> u16 {
    22
}

impl HostInfo {
    /// New host with the default port and no logins.
    pub fn new(hostname: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            address: address.into(),
            port: 22,
            logins: Vec::new(),
        }
    }

    /// Add a login identity.
    pub fn with_login(mut self, login: LoginInfo) -> Self {
        self.logins.push(login);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_username_fallback() {
        let login = LoginInfo::new("deploy");
        assert_eq!(login.username(), "deploy");

        let login = LoginInfo {
            username: Some("ubuntu".into()),
            ..LoginInfo::new("deploy")
        };
        assert_eq!(login.username(), "ubuntu");
    }

    #[test]
    fn test_host_builder() {
        let host = HostInfo::new("web1", "10.0.0.5")
            .with_login(LoginInfo::new("root"))
            .with_login(LoginInfo::new("deploy"));
        assert_eq!(host.port, 22);
        assert_eq!(host.logins.len(), 2);
    }

    #[test]
    fn test_host_deserialize_defaults() {
        let host: HostInfo = serde_json::from_str(
            r#"{"hostname":"db1","address":"10.0.0.9","logins":[{"name":"postgres"}]}"#,
        )
        .unwrap();
        assert_eq!(host.port, 22);
        assert_eq!(host.logins[0].auth, AuthMethod::DefaultKeys);
    }
}

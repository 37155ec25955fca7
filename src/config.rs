use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_IDLE_TIMEOUT_SECS;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub bind_address: String,
    pub bind_port: u16,
    pub max_connections: u32,
    pub timeout_seconds: u32,
    pub passive_port_range_start: u16,
    pub passive_port_range_end: u16,
    /// Size of the dormant data-connection reuse pool. Zero disables reuse.
    pub pool_size: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            bind_address: String::from("0.0.0.0"),
            bind_port: 21,
            max_connections: 64,
            timeout_seconds: DEFAULT_IDLE_TIMEOUT_SECS,
            passive_port_range_start: 50000,
            passive_port_range_end: 50100,
            pool_size: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PassiveConfig {
    /// Address advertised in 227 replies. Empty means "use the control
    /// socket's local address".
    pub external_ip: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub require_ssl: bool,
    pub ssl_cert_file: PathBuf,
    pub ssl_key_file: PathBuf,
    pub ssl_ca_file: PathBuf,
    pub require_client_cert: bool,
    pub ssl_client_ca_file: PathBuf,
    pub allow_anonymous: bool,
    pub anonymous_home: PathBuf,
    pub chroot_enabled: bool,
    pub chroot_directory: PathBuf,
    pub drop_privileges: bool,
    pub run_as_user: String,
    pub run_as_group: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            require_ssl: false,
            ssl_cert_file: PathBuf::new(),
            ssl_key_file: PathBuf::new(),
            ssl_ca_file: PathBuf::new(),
            require_client_cert: false,
            ssl_client_ca_file: PathBuf::new(),
            allow_anonymous: false,
            anonymous_home: PathBuf::new(),
            chroot_enabled: false,
            chroot_directory: PathBuf::from("/srv/ftp"),
            drop_privileges: false,
            run_as_user: String::new(),
            run_as_group: String::new(),
        }
    }
}

/// Parsed and handed to external collaborators; the core itself does not
/// consult these fields.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_connections_per_ip: u32,
    pub max_bytes_per_second: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_connections_per_ip: 0,
            max_bytes_per_second: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AclConfig {
    /// Address prefixes allowed to connect. Empty means allow everyone.
    pub allow: Vec<String>,
    /// Address prefixes refused at accept time. Checked before `allow`.
    pub deny: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UserConfig {
    pub username: String,
    /// bcrypt hash of the account password.
    pub password_hash: String,
    pub home: PathBuf,
    /// Empty list grants every permission.
    pub permissions: Vec<String>,
    pub enabled: bool,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password_hash: String::new(),
            home: PathBuf::new(),
            permissions: Vec::new(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server_name: String,
    pub connection: ConnectionConfig,
    pub passive: PassiveConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
    pub acl: AclConfig,
    pub users: Vec<UserConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_name: String::from("ferroftpd"),
            connection: ConnectionConfig::default(),
            passive: PassiveConfig::default(),
            security: SecurityConfig::default(),
            rate_limit: RateLimitConfig::default(),
            acl: AclConfig::default(),
            users: Vec::new(),
        }
    }
}

impl Config {
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let rendered = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        fs::write(path, rendered)
            .with_context(|| format!("Failed to write configuration file: {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.connection.passive_port_range_start > self.connection.passive_port_range_end {
            anyhow::bail!(
                "passive port range is inverted: {}..{}",
                self.connection.passive_port_range_start,
                self.connection.passive_port_range_end
            );
        }
        if self.connection.max_connections == 0 {
            anyhow::bail!("max_connections must be at least 1");
        }
        for user in &self.users {
            if user.username.is_empty() {
                anyhow::bail!("user entry with empty username");
            }
            if user.home.as_os_str().is_empty() {
                anyhow::bail!("user {} has no home directory", user.username);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.connection.bind_port, 21);
        assert_eq!(config.connection.timeout_seconds, 300);
        assert_eq!(config.connection.pool_size, 0);
        assert!(!config.security.require_ssl);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_minimal_toml() {
        let config: Config = toml::from_str(
            r#"
            server_name = "testftpd"

            [connection]
            bind_address = "127.0.0.1"
            bind_port = 2121
            max_connections = 2

            [[users]]
            username = "alice"
            password_hash = "$2b$04$abcdefghijklmnopqrstuv"
            home = "/srv/ftp/alice"
            permissions = ["list", "download"]
            "#,
        )
        .unwrap();

        assert_eq!(config.server_name, "testftpd");
        assert_eq!(config.connection.bind_port, 2121);
        assert_eq!(config.connection.max_connections, 2);
        // Unset sections fall back to defaults.
        assert_eq!(config.connection.passive_port_range_start, 50000);
        assert_eq!(config.users.len(), 1);
        assert_eq!(config.users[0].permissions.len(), 2);
        assert!(config.users[0].enabled);
    }

    #[test]
    fn rejects_inverted_passive_range() {
        let mut config = Config::default();
        config.connection.passive_port_range_start = 50100;
        config.connection.passive_port_range_end = 50000;
        assert!(config.validate().is_err());
    }
}

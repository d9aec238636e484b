// ABOUTME: Configuration types and parsing for hostconsole.yml.
// ABOUTME: Host inventory, timeouts, host key policy, and per-host credential resolution.

mod deserialize;
mod host;
mod init;

pub use host::HostEntry;
pub use init::init_config;

use crate::error::{Error, Result};
use crate::ssh::{
    AuthMode, ConnectionSpec, Credential, DEFAULT_COMMAND_TIMEOUT, DEFAULT_CONNECT_TIMEOUT,
    HostKeyPolicy, KeyPair, read_key,
};
use deserialize::deserialize_hosts;
use nonempty::NonEmpty;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "hostconsole.yml";
pub const CONFIG_FILENAME_ALT: &str = "hostconsole.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".hostconsole/config.yml";

pub const DEFAULT_LISTEN: &str = "127.0.0.1:8022";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,

    #[serde(default)]
    pub host_key_policy: HostKeyPolicy,

    #[serde(default)]
    pub global_keys: Option<GlobalKeys>,

    #[serde(deserialize_with = "deserialize_hosts")]
    pub hosts: NonEmpty<HostEntry>,
}

/// The default key pair: its public half is what `provision` installs, its private half
/// is used for hosts without their own key.
#[derive(Debug, Clone, Deserialize)]
pub struct GlobalKeys {
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
    #[serde(default)]
    pub public_key_path: Option<PathBuf>,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8022))
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

fn default_command_timeout() -> Duration {
    DEFAULT_COMMAND_TIMEOUT
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading configuration");
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    pub fn find_host(&self, name: &str) -> Result<&HostEntry> {
        self.hosts
            .iter()
            .find(|h| h.name.as_str() == name)
            .ok_or_else(|| Error::UnknownHost(name.to_string()))
    }

    /// Connection for relays and commands, using the host's configured auth mode.
    pub fn connection_spec(&self, name: &str) -> Result<ConnectionSpec> {
        let host = self.find_host(name)?;
        let credential = match host.auth {
            AuthMode::Password => {
                let password = host.password.clone().ok_or_else(|| Error::MissingCredential {
                    host: name.to_string(),
                    reason: "auth is password but no password is set".to_string(),
                })?;
                Credential::Password(password)
            }
            AuthMode::Key => {
                let path = self.private_key_path(host).ok_or_else(|| Error::MissingCredential {
                    host: name.to_string(),
                    reason: "no private_key_path on the host or in global_keys".to_string(),
                })?;
                Credential::PrivateKey(read_key(&expand_home(path))?)
            }
        };
        Ok(self.spec_for(host, credential))
    }

    /// Password connection used to register a host before key login is possible.
    pub fn provisioning_spec(&self, name: &str, password: &str) -> Result<ConnectionSpec> {
        let host = self.find_host(name)?;
        Ok(self.spec_for(host, Credential::Password(password.to_string())))
    }

    /// The global default key pair.
    pub fn global_key_pair(&self) -> Result<KeyPair> {
        let keys = self.global_keys.as_ref();
        let private = keys.and_then(|k| k.private_key_path.as_deref());
        let public = keys.and_then(|k| k.public_key_path.as_deref());
        match (private, public) {
            (Some(private), Some(public)) => {
                Ok(KeyPair::load(&expand_home(private), &expand_home(public))?)
            }
            _ => Err(Error::InvalidConfig(
                "global_keys needs both private_key_path and public_key_path".to_string(),
            )),
        }
    }

    fn private_key_path<'a>(&'a self, host: &'a HostEntry) -> Option<&'a Path> {
        host.private_key_path.as_deref().or_else(|| {
            self.global_keys
                .as_ref()
                .and_then(|k| k.private_key_path.as_deref())
        })
    }

    fn spec_for(&self, host: &HostEntry, credential: Credential) -> ConnectionSpec {
        ConnectionSpec::new(&host.address, &host.username, credential)
            .port(host.port)
            .connect_timeout(self.connect_timeout)
            .command_timeout(self.command_timeout)
            .host_key_policy(self.resolved_host_key_policy())
    }

    fn resolved_host_key_policy(&self) -> HostKeyPolicy {
        match &self.host_key_policy {
            HostKeyPolicy::KnownHosts(Some(path)) => {
                HostKeyPolicy::KnownHosts(Some(expand_home(path)))
            }
            HostKeyPolicy::TrustOnFirstUse(Some(path)) => {
                HostKeyPolicy::TrustOnFirstUse(Some(expand_home(path)))
            }
            other => other.clone(),
        }
    }
}

/// Resolve a leading `~/` against `$HOME`.
pub fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::from_yaml("hosts:\n  - root@10.0.0.5\n").unwrap();
        assert_eq!(config.listen.to_string(), DEFAULT_LISTEN);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.command_timeout, Duration::from_secs(300));
        assert_eq!(config.host_key_policy, HostKeyPolicy::InsecureAcceptAny);
        assert_eq!(config.hosts.len(), 1);
    }

    #[test]
    fn expand_home_only_touches_tilde_prefix() {
        assert_eq!(
            expand_home(Path::new("/etc/keys/id")),
            PathBuf::from("/etc/keys/id")
        );
        if let Some(home) = std::env::var_os("HOME") {
            assert_eq!(
                expand_home(Path::new("~/.ssh/id_ed25519")),
                PathBuf::from(home).join(".ssh/id_ed25519")
            );
        }
    }

    #[test]
    fn template_is_valid_yaml_config() {
        let config = Config::from_yaml(&init::template_yaml()).unwrap();
        assert_eq!(config.hosts.first().name.as_str(), "web-1");
    }

    #[test]
    fn template_host_key_example_parses_when_uncommented() {
        let yaml = init::template_yaml()
            .replace("# host_key_policy:", "host_key_policy:")
            .replace("#   known-hosts:", "  known-hosts:");
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(
            config.host_key_policy,
            HostKeyPolicy::KnownHosts(Some(PathBuf::from("~/.ssh/known_hosts")))
        );
    }
}

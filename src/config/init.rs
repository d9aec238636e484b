// ABOUTME: Config scaffolding for new installations.
// ABOUTME: Creates the hostconsole.yml template file.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::{CONFIG_FILENAME, DEFAULT_LISTEN};

/// Write a template config into `dir`, returning its path.
pub fn init_config(dir: &Path, force: bool) -> Result<PathBuf> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    std::fs::write(&config_path, template_yaml())?;

    Ok(config_path)
}

pub(super) fn template_yaml() -> String {
    format!(
        r#"listen: {DEFAULT_LISTEN}
connect_timeout: 10s
command_timeout: 5m

# Host key verification (default: insecure-accept-any, logged on every connection).
# Also accepts a bare `known-hosts` or `trust-on-first-use` for ~/.ssh/known_hosts.
# host_key_policy:
#   known-hosts: ~/.ssh/known_hosts

# Default key pair: the public key is installed by `hostconsole provision`,
# the private key is used for hosts without their own private_key_path
global_keys:
  private_key_path: ~/.ssh/id_ed25519
  public_key_path: ~/.ssh/id_ed25519.pub

hosts:
  - name: web-1
    address: 192.0.2.10
    port: 22
    username: root
    auth: key
  # - deploy@192.0.2.11:2222
"#
    )
}

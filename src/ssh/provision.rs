// ABOUTME: Public key provisioning and key pair handling.
// ABOUTME: Installs a public key into ~/.ssh/authorized_keys with one combined command.

use super::client::Session;
use super::error::{Error, Result};
use async_trait::async_trait;
use std::path::Path;

/// Anything that can run one remote command to completion and return its combined output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run_command(&self, command: &str) -> Result<String>;
}

#[async_trait]
impl CommandRunner for Session {
    async fn run_command(&self, command: &str) -> Result<String> {
        Session::run_command(self, command).await
    }
}

/// The remote command that installs `public_key`.
///
/// Directory mode 700 and file mode 600 are what sshd's StrictModes expects.
pub fn provision_command(public_key: &str) -> String {
    format!(
        "mkdir -p -m 700 ~/.ssh && echo {} >> ~/.ssh/authorized_keys && chmod 600 ~/.ssh/authorized_keys",
        public_key.trim()
    )
}

/// Append `public_key` to the remote user's authorized_keys.
///
/// Meant to run over a password-authenticated session once per host, so later logins can
/// use the matching private key.
pub async fn provision_public_key<R>(runner: &R, public_key: &str) -> Result<()>
where
    R: CommandRunner + ?Sized,
{
    if public_key.trim().is_empty() {
        return Err(Error::InvalidKey("public key is empty".to_string()));
    }

    let command = provision_command(public_key);
    runner
        .run_command(&command)
        .await
        .map_err(|e| Error::ProvisionFailed(Box::new(e)))?;

    tracing::info!("public key added to remote authorized_keys");
    Ok(())
}

/// A private/public key pair as text.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub private_key: String,
    pub public_key: String,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("private_key", &"<redacted>")
            .field("public_key", &self.public_key.trim())
            .finish()
    }
}

impl KeyPair {
    /// Load a pair from its two files.
    pub fn load(private_key_path: &Path, public_key_path: &Path) -> Result<Self> {
        Ok(Self {
            private_key: read_key(private_key_path)?,
            public_key: read_key(public_key_path)?,
        })
    }

    /// Build a pair from two key blobs given in any order.
    ///
    /// The blob whose armor mentions `PRIVATE` is the private key.
    pub fn classify(first: String, second: String) -> Self {
        if first.contains("PRIVATE") {
            Self {
                private_key: first,
                public_key: second,
            }
        } else {
            Self {
                private_key: second,
                public_key: first,
            }
        }
    }

    /// Load two key files in any order and classify them.
    pub fn load_unordered(first: &Path, second: &Path) -> Result<Self> {
        Ok(Self::classify(read_key(first)?, read_key(second)?))
    }
}

/// Read a key file as text.
pub fn read_key(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::KeyLoadFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

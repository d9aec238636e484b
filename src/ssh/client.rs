// ABOUTME: SSH session management using russh.
// ABOUTME: Handles connection specs, password/key authentication, and command execution.

use super::error::{Error, Result};
use russh::client::{self, Config, Handle, Msg};
use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use russh::keys::{PrivateKey, PrivateKeyWithHashAlg, decode_secret_key, ssh_key};
use russh::{Channel, ChannelMsg, Disconnect};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 22;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Which kind of credential a connection presents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    Password,
    #[default]
    Key,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::Password => write!(f, "password"),
            AuthMode::Key => write!(f, "key"),
        }
    }
}

/// Credential material. Exactly one secret exists per connection.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Plaintext password.
    Password(String),
    /// OpenSSH/PEM encoded private key text.
    PrivateKey(String),
}

impl Credential {
    pub fn mode(&self) -> AuthMode {
        match self {
            Credential::Password(_) => AuthMode::Password,
            Credential::PrivateKey(_) => AuthMode::Key,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password(_) => f.write_str("Password(<redacted>)"),
            Credential::PrivateKey(_) => f.write_str("PrivateKey(<redacted>)"),
        }
    }
}

/// How the server's host key is verified.
///
/// `InsecureAcceptAny` is the default: the console trusts the inventory, not the network.
/// Every accepted key is logged at warn level so the trade-off stays visible.
///
/// In YAML a policy is either a bare name (`known-hosts`) or a single-entry map from the
/// name to a known_hosts path (`known-hosts: ~/.ssh/known_hosts`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "PolicyRepr")]
pub enum HostKeyPolicy {
    #[default]
    InsecureAcceptAny,
    /// Require a matching known_hosts entry. `None` uses ~/.ssh/known_hosts.
    KnownHosts(Option<PathBuf>),
    /// Accept and record unknown hosts, reject changed keys.
    TrustOnFirstUse(Option<PathBuf>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum PolicyName {
    InsecureAcceptAny,
    KnownHosts,
    TrustOnFirstUse,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PolicyRepr {
    Bare(PolicyName),
    WithPath(BTreeMap<PolicyName, Option<PathBuf>>),
}

impl TryFrom<PolicyRepr> for HostKeyPolicy {
    type Error = String;

    fn try_from(repr: PolicyRepr) -> std::result::Result<Self, Self::Error> {
        let (name, path) = match repr {
            PolicyRepr::Bare(name) => (name, None),
            PolicyRepr::WithPath(map) => {
                let mut entries = map.into_iter();
                match (entries.next(), entries.next()) {
                    (Some(entry), None) => entry,
                    _ => return Err("host_key_policy must name exactly one policy".to_string()),
                }
            }
        };

        match (name, path) {
            (PolicyName::InsecureAcceptAny, None) => Ok(HostKeyPolicy::InsecureAcceptAny),
            (PolicyName::InsecureAcceptAny, Some(_)) => {
                Err("insecure-accept-any does not take a known_hosts path".to_string())
            }
            (PolicyName::KnownHosts, path) => Ok(HostKeyPolicy::KnownHosts(path)),
            (PolicyName::TrustOnFirstUse, path) => Ok(HostKeyPolicy::TrustOnFirstUse(path)),
        }
    }
}

/// Everything needed to open one SSH session.
#[derive(Debug, Clone)]
pub struct ConnectionSpec {
    /// Remote address (IP or hostname).
    pub address: String,
    /// SSH port (default: 22).
    pub port: u16,
    /// Username for authentication.
    pub username: String,
    pub credential: Credential,
    /// Bound on dialing plus the SSH handshake.
    pub connect_timeout: Duration,
    /// Bound on one-shot command execution (default: 5 minutes).
    pub command_timeout: Duration,
    pub host_key_policy: HostKeyPolicy,
}

impl ConnectionSpec {
    pub fn new(
        address: impl Into<String>,
        username: impl Into<String>,
        credential: Credential,
    ) -> Self {
        Self {
            address: address.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            credential,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            host_key_policy: HostKeyPolicy::default(),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key_policy = policy;
        self
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.credential.mode()
    }

    /// `address:port` as dialed.
    pub fn target(&self) -> String {
        if self.address.contains(':') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}

/// Output from a remote command execution, stdout and stderr merged in arrival order.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: u32,
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// SSH client handler for russh.
pub(crate) struct ConsoleHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

impl ConsoleHandler {
    fn new(host: String, port: u16, policy: HostKeyPolicy) -> Self {
        Self { host, port, policy }
    }

    fn check(
        &self,
        path: Option<&Path>,
        key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, russh::keys::Error> {
        match path {
            Some(path) => check_known_hosts_path(&self.host, self.port, key, path),
            None => check_known_hosts(&self.host, self.port, key),
        }
    }

    fn learn(
        &self,
        path: Option<&Path>,
        key: &ssh_key::PublicKey,
    ) -> std::result::Result<(), russh::keys::Error> {
        match path {
            Some(path) => learn_known_hosts_path(&self.host, self.port, key, path),
            None => learn_known_hosts(&self.host, self.port, key),
        }
    }
}

impl client::Handler for ConsoleHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match &self.policy {
            HostKeyPolicy::InsecureAcceptAny => {
                tracing::warn!(
                    host = %self.host,
                    port = self.port,
                    "host key verification disabled, accepting server key"
                );
                Ok(true)
            }
            HostKeyPolicy::KnownHosts(path) => {
                Ok(matches!(self.check(path.as_deref(), server_public_key), Ok(true)))
            }
            HostKeyPolicy::TrustOnFirstUse(path) => {
                match self.check(path.as_deref(), server_public_key) {
                    Ok(true) => Ok(true),
                    Ok(false) => {
                        tracing::warn!(
                            "Trust-On-First-Use: accepting unknown host key for {}:{}",
                            self.host,
                            self.port
                        );
                        if let Err(e) = self.learn(path.as_deref(), server_public_key) {
                            tracing::warn!("Failed to save host key to known_hosts: {}", e);
                        }
                        Ok(true)
                    }
                    Err(russh::keys::Error::KeyChanged { .. }) => Ok(false),
                    Err(_) => Ok(true),
                }
            }
        }
    }
}

/// An authenticated SSH session. Owns its transport; never shared between requests.
pub struct Session {
    spec: ConnectionSpec,
    handle: Handle<ConsoleHandler>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("spec", &self.spec)
            .field("handle", &"<russh::Handle>")
            .finish()
    }
}

/// Credential after local validation, ready to present to the server.
enum Authenticator {
    Password(String),
    Key(Arc<PrivateKey>),
}

impl Session {
    /// Dial and authenticate.
    ///
    /// Private keys are parsed before anything touches the network, so a malformed key
    /// fails with [`Error::InvalidKey`] without a dial.
    pub async fn connect(spec: ConnectionSpec) -> Result<Self> {
        let authenticator = Self::prepare_credential(&spec.credential)?;
        let target = spec.target();

        tracing::debug!(target = %target, user = %spec.username, mode = %spec.auth_mode(), "dialing");

        // Established sessions have no inactivity timeout; only the dial is bounded.
        let russh_config = Config {
            inactivity_timeout: None,
            ..Default::default()
        };

        let handler = ConsoleHandler::new(
            spec.address.clone(),
            spec.port,
            spec.host_key_policy.clone(),
        );

        let connect = client::connect(
            Arc::new(russh_config),
            (spec.address.as_str(), spec.port),
            handler,
        );
        let mut handle = match tokio::time::timeout(spec.connect_timeout, connect).await {
            Ok(Ok(handle)) => handle,
            Ok(Err(russh::Error::UnknownKey)) => {
                return Err(Error::HostKeyRejected { address: target });
            }
            Ok(Err(e)) => {
                return Err(Error::Network {
                    address: target,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(Error::ConnectTimeout {
                    address: target,
                    timeout: spec.connect_timeout,
                });
            }
        };

        let authenticated =
            match Self::authenticate(&mut handle, &spec.username, authenticator).await {
                Ok(authenticated) => authenticated,
                Err(e) => {
                    Self::abandon(&handle, &target).await;
                    return Err(e);
                }
            };
        if !authenticated {
            Self::abandon(&handle, &target).await;
            return Err(Error::AuthenticationFailed {
                user: spec.username.clone(),
            });
        }

        tracing::info!(target = %target, user = %spec.username, "SSH session established");

        Ok(Self { spec, handle })
    }

    /// Tear down a handle that never authenticated.
    async fn abandon(handle: &Handle<ConsoleHandler>, target: &str) {
        if let Err(e) = handle.disconnect(Disconnect::ByApplication, "", "en").await {
            tracing::debug!(target = %target, "disconnect after failed login failed: {}", e);
        }
    }

    fn prepare_credential(credential: &Credential) -> Result<Authenticator> {
        match credential {
            Credential::Password(password) => Ok(Authenticator::Password(password.clone())),
            Credential::PrivateKey(pem) => {
                let key = decode_secret_key(pem, None)
                    .map_err(|e| Error::InvalidKey(e.to_string()))?;
                Ok(Authenticator::Key(Arc::new(key)))
            }
        }
    }

    async fn authenticate(
        handle: &mut Handle<ConsoleHandler>,
        user: &str,
        authenticator: Authenticator,
    ) -> Result<bool> {
        match authenticator {
            Authenticator::Password(password) => {
                let result = handle
                    .authenticate_password(user, password)
                    .await
                    .map_err(Error::Protocol)?;
                Ok(result.success())
            }
            Authenticator::Key(key) => {
                let hash_alg = handle
                    .best_supported_rsa_hash()
                    .await
                    .map_err(Error::Protocol)?
                    .flatten();

                let result = handle
                    .authenticate_publickey(user, PrivateKeyWithHashAlg::new(key, hash_alg))
                    .await
                    .map_err(Error::Protocol)?;

                Ok(result.success())
            }
        }
    }

    pub fn spec(&self) -> &ConnectionSpec {
        &self.spec
    }

    /// Open a fresh session channel on this transport.
    pub(crate) async fn open_channel(&self) -> Result<Channel<Msg>> {
        self.handle
            .channel_open_session()
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to open channel: {}", e)))
    }

    /// Run a command and return its combined output, failing on a non-zero exit status.
    pub async fn run_command(&self, command: &str) -> Result<String> {
        let output = self.exec(command).await?;
        if output.success() {
            Ok(output.output)
        } else {
            Err(Error::CommandExit {
                exit_code: output.exit_code,
                output: output.output,
            })
        }
    }

    /// Execute a command on the remote host.
    pub async fn exec(&self, command: &str) -> Result<CommandOutput> {
        self.exec_with_timeout(command, self.spec.command_timeout)
            .await
    }

    /// Execute a command with a custom timeout.
    pub async fn exec_with_timeout(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        match tokio::time::timeout(timeout, self.exec_inner(command)).await {
            Ok(result) => result,
            Err(_) => Err(Error::CommandTimeout(timeout)),
        }
    }

    async fn exec_inner(&self, command: &str) -> Result<CommandOutput> {
        let mut channel = self.open_channel().await?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to exec command: {}", e)))?;

        let mut output = Vec::new();
        let mut exit_code = 0u32;

        let mut got_exit_status = false;
        let mut got_eof = false;

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    output.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExtendedData { data, .. }) => {
                    output.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    exit_code = exit_status;
                    got_exit_status = true;
                    if got_eof {
                        break;
                    }
                }
                Some(ChannelMsg::Eof) => {
                    got_eof = true;
                    if got_exit_status {
                        break;
                    }
                }
                Some(ChannelMsg::Close) => {
                    break;
                }
                Some(_) => {}
                None => break,
            }
        }

        let _ = channel.close().await;

        // No exit status means the channel died underneath the command.
        if !got_exit_status {
            return Err(Error::ChannelClosed);
        }

        tracing::debug!(exit_code, bytes = output.len(), "command finished");

        Ok(CommandOutput {
            exit_code,
            output: String::from_utf8_lossy(&output).to_string(),
        })
    }

    /// Disconnect the session.
    pub async fn disconnect(self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(Error::Protocol)?;
        tracing::debug!(target = %self.spec.target(), "SSH session closed");
        Ok(())
    }
}

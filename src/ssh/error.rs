// ABOUTME: SSH-specific error types.
// ABOUTME: Covers dialing, authentication, channel requests and remote command failures.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("connection to {address} failed: {reason}")]
    Network { address: String, reason: String },

    #[error("connection to {address} timed out after {timeout:?}")]
    ConnectTimeout { address: String, timeout: Duration },

    #[error("host key for {address} was rejected by the host key policy")]
    HostKeyRejected { address: String },

    #[error("authentication failed for user {user}")]
    AuthenticationFailed { user: String },

    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("failed to load key from {path}: {reason}")]
    KeyLoadFailed { path: PathBuf, reason: String },

    #[error("{request} request rejected by server")]
    RequestRejected { request: &'static str },

    #[error("command execution failed: {0}")]
    CommandFailed(String),

    #[error("command exited with status {exit_code}: {output}")]
    CommandExit { exit_code: u32, output: String },

    #[error("command timed out after {0:?}")]
    CommandTimeout(Duration),

    #[error("channel closed unexpectedly without exit status")]
    ChannelClosed,

    #[error("failed to add public key to remote host: {0}")]
    ProvisionFailed(#[source] Box<Error>),

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),

    #[error("SSH key error: {0}")]
    Key(#[from] russh::keys::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of SSH failures for callers that only need the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Dial, timeout, or host key rejection.
    Network,
    /// Credential rejected or unusable.
    Authentication,
    /// Channel or request rejected at the SSH protocol level.
    Protocol,
    /// Remote command failed or timed out.
    Command,
    /// Local I/O failure.
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Network { .. } | Error::ConnectTimeout { .. } | Error::HostKeyRejected { .. } => {
                ErrorKind::Network
            }
            Error::AuthenticationFailed { .. }
            | Error::InvalidKey(_)
            | Error::KeyLoadFailed { .. }
            | Error::Key(_) => ErrorKind::Authentication,
            Error::RequestRejected { .. } | Error::ChannelClosed | Error::Protocol(_) => {
                ErrorKind::Protocol
            }
            Error::CommandFailed(_)
            | Error::CommandExit { .. }
            | Error::CommandTimeout(_)
            | Error::ProvisionFailed(_) => ErrorKind::Command,
            Error::Io(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

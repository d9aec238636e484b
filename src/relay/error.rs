// ABOUTME: Bridge error types with SNAFU pattern.
// ABOUTME: Each failed bridge transition maps to one context variant.

use snafu::Snafu;

use crate::ssh;

/// Failure that closed a bridge with `Closed(Error)`.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BridgeError {
    #[snafu(display("SSH connection failed: {source}"))]
    Connect { source: ssh::Error },

    #[snafu(display("pseudo-terminal request failed: {source}"))]
    Pty { source: ssh::Error },

    #[snafu(display("shell request failed: {source}"))]
    Shell { source: ssh::Error },

    #[snafu(display("failed to forward input to the remote shell: {source}"))]
    RemoteInput { source: std::io::Error },
}

impl BridgeError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> ssh::ErrorKind {
        match self {
            BridgeError::Connect { source } => source.kind(),
            // A rejected request is a protocol failure even if the channel died under it.
            BridgeError::Pty { .. } | BridgeError::Shell { .. } => ssh::ErrorKind::Protocol,
            BridgeError::RemoteInput { .. } => ssh::ErrorKind::Io,
        }
    }
}

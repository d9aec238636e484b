// ABOUTME: Application-wide error types for hostconsole.
// ABOUTME: Uses thiserror for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

use crate::relay::BridgeError;
use crate::ssh;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("unknown host: {0}")]
    UnknownHost(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no credential for host {host}: {reason}")]
    MissingCredential { host: String, reason: String },

    #[error(transparent)]
    Ssh(#[from] ssh::Error),

    #[error(transparent)]
    Relay(#[from] BridgeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

// ABOUTME: SSH client module for remote host sessions.
// ABOUTME: Password and key authentication, one-shot commands, pty shells, key provisioning.

mod client;
mod error;
mod provision;
mod pty;
mod terminal;

pub use client::{
    AuthMode, CommandOutput, ConnectionSpec, Credential, DEFAULT_COMMAND_TIMEOUT,
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, HostKeyPolicy, Session,
};
pub use error::{Error, ErrorKind, Result};
pub use provision::{CommandRunner, KeyPair, provision_command, provision_public_key, read_key};
pub use pty::PtyRequest;
pub use terminal::{ShellEvent, ShellInput, ShellOutput, TerminalChannel};

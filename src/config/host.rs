// ABOUTME: Inventory entry for one remote host.
// ABOUTME: Parses the short form "user@address:port" as well as the detailed mapping.

use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

use super::deserialize::deserialize_host_name;
use crate::ssh::{AuthMode, DEFAULT_PORT};
use crate::types::HostName;

#[derive(Clone, Deserialize)]
pub struct HostEntry {
    #[serde(deserialize_with = "deserialize_host_name")]
    pub name: HostName,
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub auth: AuthMode,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_username() -> String {
    "root".to_string()
}

impl fmt::Debug for HostEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostEntry")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("auth", &self.auth)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("private_key_path", &self.private_key_path)
            .finish()
    }
}

impl HostEntry {
    /// Parse `[user@]address[:port]`. IPv6 addresses take a port only in brackets,
    /// `[::1]:2222`. The entry is named after its address and uses key auth.
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("host address cannot be empty".to_string());
        }

        let (user_part, rest) = match s.split_once('@') {
            Some((user, rest)) => (Some(user), rest),
            None => (None, s),
        };

        let (address, port) = split_port(rest)?;

        if address.is_empty() {
            return Err("host address cannot be empty".to_string());
        }
        if user_part.is_some_and(str::is_empty) {
            return Err("username cannot be empty".to_string());
        }

        let name = name_for_address(address)?;

        Ok(HostEntry {
            name,
            address: address.to_string(),
            port,
            username: user_part.map_or_else(default_username, str::to_string),
            auth: AuthMode::Key,
            password: None,
            private_key_path: None,
        })
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

fn split_port(rest: &str) -> Result<(&str, u16), String> {
    let parse_port = |port: &str| {
        port.parse::<u16>()
            .map_err(|_| format!("invalid port: {}", port))
    };

    if let Some(bracketed) = rest.strip_prefix('[') {
        let (address, after) = bracketed
            .split_once(']')
            .ok_or_else(|| format!("unclosed '[' in {}", rest))?;
        return match after {
            "" => Ok((address, DEFAULT_PORT)),
            _ => match after.strip_prefix(':') {
                Some(port) => Ok((address, parse_port(port)?)),
                None => Err(format!("unexpected text after ']': {}", after)),
            },
        };
    }

    match rest.split_once(':') {
        // More than one colon is a bare IPv6 address.
        Some((_, tail)) if tail.contains(':') => Ok((rest, DEFAULT_PORT)),
        Some((address, port)) => Ok((address, parse_port(port)?)),
        None => Ok((rest, DEFAULT_PORT)),
    }
}

/// Lowercase the address and replace anything a host name cannot hold with `-`.
fn name_for_address(address: &str) -> Result<HostName, String> {
    let sanitized: String = address
        .chars()
        .map(|c| match c.to_ascii_lowercase() {
            c @ ('a'..='z' | '0'..='9' | '.' | '_' | '-') => c,
            _ => '-',
        })
        .collect();
    let trimmed = sanitized.trim_matches(|c| matches!(c, '-' | '.'));

    HostName::new(trimmed).map_err(|e| format!("{address}: {e}"))
}

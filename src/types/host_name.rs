// ABOUTME: Inventory host name validation.
// ABOUTME: Names are used in console URLs and CLI arguments, so the character set is narrow.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const MAX_HOST_NAME_LEN: usize = 63;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostNameError {
    #[error("host name cannot be empty")]
    Empty,

    #[error("host name exceeds maximum length of 63 characters")]
    TooLong,

    #[error("host name cannot start with '{0}'")]
    BadStart(char),

    #[error("host name cannot end with '{0}'")]
    BadEnd(char),

    #[error("host name must be lowercase")]
    NotLowercase,

    #[error("invalid character in host name: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostName(String);

impl HostName {
    pub fn new(value: &str) -> Result<Self, HostNameError> {
        if value.is_empty() {
            return Err(HostNameError::Empty);
        }

        if value.len() > MAX_HOST_NAME_LEN {
            return Err(HostNameError::TooLong);
        }

        for c in value.chars() {
            if c.is_ascii_uppercase() {
                return Err(HostNameError::NotLowercase);
            }
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && !matches!(c, '-' | '.' | '_') {
                return Err(HostNameError::InvalidChar(c));
            }
        }

        if let Some(c) = value.chars().next().filter(|c| matches!(c, '-' | '.')) {
            return Err(HostNameError::BadStart(c));
        }

        if let Some(c) = value.chars().last().filter(|c| matches!(c, '-' | '.')) {
            return Err(HostNameError::BadEnd(c));
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for HostName {
    type Err = HostNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for HostName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

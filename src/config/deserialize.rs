// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Handles host names and the host inventory list.

use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::HashSet;

use super::HostEntry;
use crate::types::HostName;

pub fn deserialize_host_name<'de, D>(deserializer: D) -> Result<HostName, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    HostName::new(&s).map_err(serde::de::Error::custom)
}

pub fn deserialize_hosts<'de, D>(deserializer: D) -> Result<NonEmpty<HostEntry>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<HostSpec> = Vec::deserialize(deserializer)?;
    let hosts = values
        .into_iter()
        .map(HostSpec::into_host_entry)
        .collect::<Result<Vec<_>, _>>()
        .map_err(serde::de::Error::custom)?;

    let mut seen = HashSet::new();
    if let Some(dup) = hosts.iter().find(|h| !seen.insert(h.name.clone())) {
        return Err(serde::de::Error::custom(format!(
            "duplicate host name: {}",
            dup.name
        )));
    }

    NonEmpty::from_vec(hosts)
        .ok_or_else(|| serde::de::Error::custom("at least one host is required"))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HostSpec {
    Simple(String),
    Detailed(HostEntry),
}

impl HostSpec {
    fn into_host_entry(self) -> Result<HostEntry, String> {
        match self {
            HostSpec::Simple(s) => HostEntry::parse(&s),
            HostSpec::Detailed(h) => Ok(h),
        }
    }
}

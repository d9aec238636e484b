// ABOUTME: Validated domain types.
// ABOUTME: Host names are checked once at the config boundary.

mod host_name;

pub use host_name::{HostName, HostNameError, MAX_HOST_NAME_LEN};

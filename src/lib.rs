// ABOUTME: Library root for hostconsole - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod error;
pub mod output;
pub mod relay;
pub mod server;
pub mod ssh;
pub mod types;

// ABOUTME: Console relay between a message-framed client and a remote pty shell.
// ABOUTME: Adapters, the type-state bridge, and the WebSocket transport.

mod adapter;
mod bridge;
mod error;
mod state;
pub mod websocket;

pub use adapter::{ClientReader, ClientWriter};
pub use bridge::{RemoteOutput, Termination, TerminalBridge, pump, relay};
pub use error::BridgeError;
pub use state::{Authenticated, BridgeState, CloseKind, Idle, PtyRequested, Stage};

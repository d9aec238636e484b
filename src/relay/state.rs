// ABOUTME: Bridge state types for the type state pattern.
// ABOUTME: Each state carries exactly the resources that exist at that point of the lifecycle.

use std::fmt;

use crate::ssh::{ConnectionSpec, Session, TerminalChannel};

/// Nothing dialed yet.
/// Available actions: `dial()`
pub struct Idle {
    pub(super) spec: ConnectionSpec,
}

/// Transport up and authenticated.
/// Available actions: `request_pty()`
pub struct Authenticated {
    pub(super) session: Session,
}

/// Pty allocated on an open channel.
/// Available actions: `start_and_bridge()`
pub struct PtyRequested {
    pub(super) session: Session,
    pub(super) terminal: TerminalChannel,
}

/// How a bridge ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseKind {
    Normal,
    Error,
}

/// Observable lifecycle position of a bridge, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Idle,
    Dialing,
    Authenticated,
    PtyRequested,
    ShellRunning,
    Closed(CloseKind),
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeState::Idle => write!(f, "idle"),
            BridgeState::Dialing => write!(f, "dialing"),
            BridgeState::Authenticated => write!(f, "authenticated"),
            BridgeState::PtyRequested => write!(f, "pty-requested"),
            BridgeState::ShellRunning => write!(f, "shell-running"),
            BridgeState::Closed(CloseKind::Normal) => write!(f, "closed"),
            BridgeState::Closed(CloseKind::Error) => write!(f, "closed-with-error"),
        }
    }
}

/// Maps a state type to its [`BridgeState`].
pub trait Stage {
    const STATE: BridgeState;
}

impl Stage for Idle {
    const STATE: BridgeState = BridgeState::Idle;
}

impl Stage for Authenticated {
    const STATE: BridgeState = BridgeState::Authenticated;
}

impl Stage for PtyRequested {
    const STATE: BridgeState = BridgeState::PtyRequested;
}

//! The interactive terminal path.
//!
//! - [`actions`] - pending actions awaiting a UI reply
//! - [`detector`] - prompt detection and the allow/deny write-back
//! - [`pty`] - agent CLIs in pseudo-terminals

pub mod actions;
pub mod detector;
pub mod pty;

pub use actions::{
    AbortController, AbortSignal, ActionBridge, ActionDecision, ActionError, ActionKind,
    ActionResponse, PendingResponse, RespondResult,
};
pub use detector::{TerminalBridge, TerminalWriter};
pub use pty::{PtyManager, PtySpawnConfig};

//! Hookline core library.
//!
//! Runs AI coding-assistant CLIs (Claude, Codex, Gemini) as child processes,
//! normalizes everything they say into one [`events::AgentEvent`] model, and
//! brokers permission decisions back to them.
//!
//! # Architecture
//!
//! ```text
//! hookline-core/
//! ├── agents/        # Vendor adapters, drivers, Claude hook bridge
//! ├── events/        # Event model and ordered registry
//! ├── permission/    # Policy rules, presets, store, gate
//! ├── process/       # Child lifecycle and per-vendor services
//! ├── terminal/      # Prompt detection, action round trips, PTYs
//! ├── session/       # Active session per workspace
//! ├── tools.rs       # Custom tools
//! ├── config.rs      # config.json
//! ├── context.rs     # Wiring
//! ├── event_bus.rs   # Broadcast to UI surfaces
//! ├── logging.rs     # Per-process transcripts
//! └── workspace.rs   # Workspace env (git branch)
//! ```
//!
//! Hosts build a [`context::HooklineContext`] once and use its services.

pub mod agents;
pub mod config;
pub mod context;
pub mod error;
pub mod event_bus;
pub mod events;
pub mod logging;
pub mod permission;
pub mod process;
pub mod session;
pub mod terminal;
pub mod tools;
pub mod workspace;

pub use agents::AgentType;
pub use context::HooklineContext;
pub use error::{AgentError, AgentResult, ErrorCode};

//! Permission decisions for tool invocations.
//!
//! - [`policy`] - ordered allow/deny/ask rules and the two presets
//! - [`store`] - per-project policies on disk
//! - [`gate`] - enforcement as a registry handler
//! - read-only shell command detection (safe-command list + prefix parser)

mod command_parser;
pub mod gate;
pub mod policy;
mod safe_commands;
pub mod store;

pub use command_parser::{is_read_only, parse_command_prefixes};
pub use gate::PermissionGate;
pub use policy::{Decision, PermissionPolicy, PermissionRule, PolicyConfig, PolicyError, PolicyPreset};
pub use safe_commands::{READ_ONLY_COMMANDS, SINGLE_WORD_COMMANDS};
pub use store::PolicyStore;

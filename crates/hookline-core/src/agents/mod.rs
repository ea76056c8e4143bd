//! Vendor integrations.
//!
//! Each vendor (Claude, Codex, Gemini) has its own submodule with an adapter
//! (vendor messages and terminal text to [`AgentEvent`]s) and a driver
//! (argument vectors and output parsing for the CLI). All of them emit the
//! same event taxonomy.
//!
//! [`AgentEvent`]: crate::events::AgentEvent

pub mod adapter;
pub mod driver;
pub mod terminal;

pub mod claude;
pub mod codex;
pub mod gemini;

use serde::{Deserialize, Serialize};

pub use adapter::{AdapterRegistry, VendorAdapter};
pub use driver::{AgentDriver, AgentOperation, AgentOutput, SessionRef};

/// The vendor tag carried by every event and process handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Claude,
    Codex,
    Gemini,
}

impl AgentType {
    pub const ALL: [AgentType; 3] = [AgentType::Claude, AgentType::Codex, AgentType::Gemini];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Claude => "claude",
            AgentType::Codex => "codex",
            AgentType::Gemini => "gemini",
        }
    }

    /// Executable name looked up on PATH when no override is configured.
    pub fn default_binary(&self) -> &'static str {
        self.as_str()
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown agent type: {s}"))
    }
}

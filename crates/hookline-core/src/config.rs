//! Core configuration.
//!
//! Read from `config.json` in the config directory:
//!
//! ```json
//! {
//!   "logDir": "/tmp/hookline-logs",
//!   "shellPrefix": "/bin/zsh -l -c",
//!   "defaultTimeoutMs": 300000,
//!   "probeTimeoutMs": 5000,
//!   "binaries": { "claude": "/opt/claude/bin/claude" },
//!   "defaultPolicy": "interactive"
//! }
//! ```
//!
//! Every field is optional; a missing file means all defaults.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agents::AgentType;
use crate::permission::PolicyPreset;
use crate::process::SpawnOptions;

pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreConfig {
    /// Per-process transcripts go here when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,
    /// `None` uses the login shell; `""` runs binaries directly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell_prefix: Option<String>,
    pub default_timeout_ms: u64,
    pub probe_timeout_ms: u64,
    pub binaries: HashMap<AgentType, String>,
    pub default_policy: PolicyPreset,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            shell_prefix: None,
            default_timeout_ms: 300_000,
            probe_timeout_ms: 5_000,
            binaries: HashMap::new(),
            default_policy: PolicyPreset::Interactive,
        }
    }
}

impl CoreConfig {
    /// Load `config.json` from `dir`.
    ///
    /// # Errors
    ///
    /// Only if the file exists but can't be read or parsed.
    pub fn load(dir: &Path) -> Result<Self, std::io::Error> {
        let file_path = dir.join(CONFIG_FILE);
        if !file_path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(&file_path)?;
        serde_json::from_str(&contents)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Write `config.json` atomically.
    pub fn save(&self, dir: &Path) -> Result<(), std::io::Error> {
        fs::create_dir_all(dir)?;
        let file_path = dir.join(CONFIG_FILE);
        let temp_path = dir.join(format!("{CONFIG_FILE}.tmp"));
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, &file_path)
    }

    /// The configured binary for `agent`, or its default name.
    pub fn binary_for(&self, agent: AgentType) -> String {
        self.binaries
            .get(&agent)
            .cloned()
            .unwrap_or_else(|| agent.default_binary().to_string())
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Base spawn options every agent service starts from.
    pub fn spawn_options(&self) -> SpawnOptions {
        let mut opts = SpawnOptions::default();
        if let Some(ref prefix) = self.shell_prefix {
            opts = opts.shell_prefix(prefix.clone());
        }
        if let Some(ref dir) = self.log_dir {
            opts = opts.log_dir(dir.clone());
        }
        opts
    }
}

/// `$HOME/.config/hookline`, or `.hookline` in the working directory when
/// no home directory is set.
pub fn default_config_dir() -> PathBuf {
    match home_dir() {
        Some(home) => PathBuf::from(home).join(".config").join("hookline"),
        None => PathBuf::from(".hookline"),
    }
}

fn home_dir() -> Option<String> {
    ["HOME", "USERPROFILE"]
        .into_iter()
        .filter_map(|key| env::var(key).ok())
        .find(|value| !value.is_empty())
}

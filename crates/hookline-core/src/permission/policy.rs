//! Rule-based allow/deny/ask decisions for tool invocations.
//!
//! A [`PolicyConfig`] is the serializable form (what lives on disk); it is
//! compiled once into a [`PermissionPolicy`], which validates every command
//! pattern up front so evaluation never fails.
//!
//! Rules are checked in order and the first rule whose matchers all hold
//! decides. If none match, the policy's default applies.

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::command_parser::is_read_only;
use crate::events::{AgentEvent, EventPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny,
    Ask,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Deny => "deny",
            Decision::Ask => "ask",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rule. Every matcher that is set must hold for the rule to apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRule {
    /// Tool name, compared case-insensitively. `*` matches any tool.
    pub tool: String,
    /// Regex searched in the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Only matches commands made entirely of read-only parts.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd_prefix: Option<String>,
    pub decision: Decision,
}

impl PermissionRule {
    pub fn new(tool: impl Into<String>, decision: Decision) -> Self {
        Self {
            tool: tool.into(),
            command: None,
            read_only: false,
            cwd_prefix: None,
            decision,
        }
    }

    pub fn command(mut self, pattern: impl Into<String>) -> Self {
        self.command = Some(pattern.into());
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn cwd_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cwd_prefix = Some(prefix.into());
        self
    }
}

/// Serializable policy: ordered rules plus a fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfig {
    #[serde(default)]
    pub rules: Vec<PermissionRule>,
    pub default: Decision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyPreset {
    #[default]
    Interactive,
    Autonomous,
}

impl PolicyPreset {
    pub fn config(self) -> PolicyConfig {
        match self {
            PolicyPreset::Interactive => interactive_config(),
            PolicyPreset::Autonomous => autonomous_config(),
        }
    }

    pub fn policy(self) -> PermissionPolicy {
        match self {
            PolicyPreset::Interactive => PermissionPolicy::interactive(),
            PolicyPreset::Autonomous => PermissionPolicy::autonomous(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Invalid command pattern {pattern:?} in rule {index}: {source}")]
    InvalidPattern {
        index: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

// ============================================================================
// PRESETS
// ============================================================================

/// Tools that only read, across the three vendors.
const READ_ONLY_TOOLS: &[&str] = &[
    // claude
    "Read",
    "Glob",
    "Grep",
    "LS",
    "NotebookRead",
    "WebSearch",
    "WebFetch",
    // gemini
    "read_file",
    "read_many_files",
    "list_directory",
    "glob",
    "search_file_content",
    "google_web_search",
    "web_fetch",
];

/// Shell patterns never allowed without a human.
const DESTRUCTIVE_PATTERNS: &[&str] = &[
    r"\brm\s+(-[a-zA-Z]*\s+)*-[a-zA-Z]*[rRf]",
    r"\bsudo\b",
    r"\bgit\s+push\b.*(\s--force\b|\s-f\b|\s--force-with-lease\b)",
    r"\bgit\s+reset\s+--hard\b",
    r"\bgit\s+clean\s+-[a-zA-Z]*f",
    r"\bmkfs(\.\w+)?\b",
    r"\bdd\b.*\bof=/dev/",
    r">\s*/dev/(sd|nvme|disk)",
    r"\bchmod\s+(-R\s+)?0?777\b",
    r"\b(curl|wget)\b[^|]*\|\s*(ba|z)?sh\b",
    r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:",
    r"\b(shutdown|reboot|halt)\b",
];

fn interactive_config() -> PolicyConfig {
    PolicyConfig {
        rules: Vec::new(),
        default: Decision::Ask,
    }
}

fn autonomous_config() -> PolicyConfig {
    let deny = DESTRUCTIVE_PATTERNS
        .iter()
        .map(|p| PermissionRule::new("*", Decision::Deny).command(*p));
    let read_tools = READ_ONLY_TOOLS
        .iter()
        .map(|t| PermissionRule::new(*t, Decision::Allow));
    let read_commands = std::iter::once(PermissionRule::new("*", Decision::Allow).read_only());

    PolicyConfig {
        rules: deny.chain(read_tools).chain(read_commands).collect(),
        default: Decision::Allow,
    }
}

// ============================================================================
// COMPILED POLICY
// ============================================================================

#[derive(Debug, Clone)]
struct CompiledRule {
    tool: Option<String>,
    command: Option<Regex>,
    read_only: bool,
    cwd_prefix: Option<String>,
    decision: Decision,
}

impl CompiledRule {
    fn matches(&self, tool: &str, command: Option<&str>, cwd: Option<&str>) -> bool {
        if let Some(ref want) = self.tool {
            if !want.eq_ignore_ascii_case(tool) {
                return false;
            }
        }
        if let Some(ref re) = self.command {
            if !command.is_some_and(|c| re.is_match(c)) {
                return false;
            }
        }
        if self.read_only && !command.is_some_and(is_read_only) {
            return false;
        }
        if let Some(ref prefix) = self.cwd_prefix {
            if !cwd.is_some_and(|c| c.starts_with(prefix.as_str())) {
                return false;
            }
        }
        true
    }
}

/// A compiled, ready-to-evaluate policy.
#[derive(Debug, Clone)]
pub struct PermissionPolicy {
    rules: Vec<CompiledRule>,
    default: Decision,
    config: PolicyConfig,
}

impl PermissionPolicy {
    pub fn compile(config: PolicyConfig) -> Result<Self, PolicyError> {
        let mut rules = Vec::with_capacity(config.rules.len());
        for (index, rule) in config.rules.iter().enumerate() {
            let command = match rule.command {
                Some(ref pattern) => Some(Regex::new(pattern).map_err(|source| {
                    PolicyError::InvalidPattern {
                        index,
                        pattern: pattern.clone(),
                        source,
                    }
                })?),
                None => None,
            };
            rules.push(CompiledRule {
                tool: (rule.tool != "*").then(|| rule.tool.clone()),
                command,
                read_only: rule.read_only,
                cwd_prefix: rule.cwd_prefix.clone(),
                decision: rule.decision,
            });
        }
        Ok(Self {
            rules,
            default: config.default,
            config,
        })
    }

    /// Always ask.
    pub fn interactive() -> Self {
        Self {
            rules: Vec::new(),
            default: Decision::Ask,
            config: interactive_config(),
        }
    }

    /// Deny destructive shell commands, allow reads, allow everything else.
    pub fn autonomous() -> Self {
        // The preset patterns are constants covered by tests.
        Self::compile(autonomous_config()).unwrap_or_else(|e| {
            log::error!("Autonomous preset failed to compile: {e}");
            Self::interactive()
        })
    }

    pub fn evaluate(&self, tool: &str, command: Option<&str>, cwd: Option<&str>) -> Decision {
        self.rules
            .iter()
            .find(|r| r.matches(tool, command, cwd))
            .map_or(self.default, |r| r.decision)
    }

    /// Evaluate a `tool:begin` or `permission:request` event. Other event
    /// types have nothing to decide and give `None`.
    pub fn evaluate_event(&self, event: &AgentEvent) -> Option<Decision> {
        let cwd = event.workspace_path.as_deref();
        match event.payload {
            EventPayload::ToolBegin(ref p) => {
                let command = p.tool_input.get("command").and_then(|c| c.as_str());
                Some(self.evaluate(&p.tool_name, command, cwd))
            }
            EventPayload::PermissionRequest(ref p) => {
                let command = p.command.as_deref().or_else(|| {
                    p.tool_input
                        .as_ref()
                        .and_then(|i| i.get("command"))
                        .and_then(|c| c.as_str())
                });
                Some(self.evaluate(&p.tool_name, command, cwd))
            }
            _ => None,
        }
    }

    pub fn default_decision(&self) -> Decision {
        self.default
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }
}

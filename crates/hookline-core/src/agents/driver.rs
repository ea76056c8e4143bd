//! Per-vendor command-line contract: which binary, which arguments for which
//! operation, and how to read the one-shot result.

use serde::{Deserialize, Serialize};

use super::AgentType;
use crate::error::{AgentError, AgentResult};

/// How a resume or fork addresses an existing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SessionRef {
    Id { id: String },
    Name { name: String },
    /// The most recent session, resolved by the vendor CLI itself.
    Latest,
}

impl SessionRef {
    pub fn id(id: impl Into<String>) -> Self {
        SessionRef::Id { id: id.into() }
    }

    pub fn name(name: impl Into<String>) -> Self {
        SessionRef::Name { name: name.into() }
    }

    /// The concrete identifier, or `SESSION_INVALID` for [`SessionRef::Latest`].
    ///
    /// There is no session listing to resolve "latest" against, so anything
    /// that needs a real id (forking) has to reject it up front.
    pub fn require_concrete(&self) -> AgentResult<&str> {
        match self {
            SessionRef::Id { id } => Ok(id),
            SessionRef::Name { name } => Ok(name),
            SessionRef::Latest => Err(AgentError::session_invalid(
                "Cannot fork from the latest session: a concrete session id or name is required",
            )),
        }
    }
}

/// One invocation of a vendor CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum AgentOperation {
    Generate { prompt: String },
    Resume { session: SessionRef, prompt: String },
    Fork { from: SessionRef, prompt: String },
}

impl AgentOperation {
    pub fn prompt(&self) -> &str {
        match self {
            AgentOperation::Generate { prompt }
            | AgentOperation::Resume { prompt, .. }
            | AgentOperation::Fork { prompt, .. } => prompt,
        }
    }
}

/// Parsed result of a one-shot run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentOutput {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub raw: serde_json::Value,
}

/// Argument building and output parsing for one vendor CLI.
pub trait AgentDriver: Send + Sync {
    fn agent_type(&self) -> AgentType;

    /// Executable name or path.
    fn binary(&self) -> &str;

    /// Arguments for the availability probe.
    fn version_args(&self) -> Vec<String> {
        vec!["--version".to_string()]
    }

    /// Argument vector for `op`. Fails before anything is spawned when the
    /// operation can't be expressed for this vendor.
    fn build_args(&self, op: &AgentOperation) -> AgentResult<Vec<String>>;

    /// Interpret the buffered stdout of a successful run.
    fn parse_output(&self, stdout: &str) -> AgentResult<AgentOutput>;
}

/// Last line of `stdout` that parses as a JSON object.
pub(crate) fn last_json_object(stdout: &str) -> Option<serde_json::Value> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|l| l.starts_with('{'))
        .find_map(|l| serde_json::from_str::<serde_json::Value>(l).ok())
        .filter(|v| v.is_object())
}

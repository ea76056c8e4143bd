//! One-shot `codex exec --json` invocations.
//!
//! Stdout is JSON Lines. The final answer is the last agent message; the
//! session id comes from `thread.started` (or `SessionConfigured` on older
//! builds).

use serde_json::Value;

use crate::agents::driver::{AgentDriver, AgentOperation, AgentOutput, SessionRef};
use crate::agents::AgentType;
use crate::error::{AgentError, AgentResult};

#[derive(Debug, Clone)]
pub struct CodexDriver {
    binary: String,
    model: Option<String>,
}

impl CodexDriver {
    pub fn new() -> Self {
        Self {
            binary: AgentType::Codex.default_binary().to_string(),
            model: None,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

impl Default for CodexDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentDriver for CodexDriver {
    fn agent_type(&self) -> AgentType {
        AgentType::Codex
    }

    fn binary(&self) -> &str {
        &self.binary
    }

    fn build_args(&self, op: &AgentOperation) -> AgentResult<Vec<String>> {
        let mut args = vec!["exec".to_string()];
        match op {
            AgentOperation::Generate { .. } => {}
            AgentOperation::Resume { session, .. } => {
                args.push("resume".to_string());
                match session {
                    SessionRef::Latest => args.push("--last".to_string()),
                    SessionRef::Id { id } => args.push(id.clone()),
                    SessionRef::Name { name } => args.push(name.clone()),
                }
            }
            AgentOperation::Fork { from, .. } => {
                from.require_concrete()?;
                return Err(AgentError::session_invalid(
                    "Codex cannot fork a session; resume it instead",
                ));
            }
        }
        args.push("--json".to_string());
        if let Some(ref model) = self.model {
            if !model.is_empty() {
                args.extend(["--model".to_string(), model.clone()]);
            }
        }
        args.push(op.prompt().to_string());
        Ok(args)
    }

    fn parse_output(&self, stdout: &str) -> AgentResult<AgentOutput> {
        let mut session_id = None;
        let mut text = None;
        let mut last = None;

        for line in stdout.lines().map(str::trim).filter(|l| l.starts_with('{')) {
            let Ok(json) = serde_json::from_str::<Value>(line) else {
                log::debug!("Skipping non-JSON codex line: {line}");
                continue;
            };
            let msg = json.get("msg").filter(|m| m.is_object()).unwrap_or(&json);
            match msg.get("type").and_then(Value::as_str).unwrap_or_default() {
                "thread.started" | "SessionConfigured" | "session_configured" => {
                    session_id = msg
                        .get("thread_id")
                        .or_else(|| msg.get("session_id"))
                        .and_then(Value::as_str)
                        .map(str::to_string);
                }
                "item.completed" => {
                    let item = &msg["item"];
                    if item["type"] == "agent_message" {
                        text = item["text"].as_str().map(str::to_string);
                    }
                }
                "AgentMessage" | "agent_message" => {
                    text = msg["message"].as_str().map(str::to_string);
                }
                "turn.failed" | "error" | "Error" => {
                    let message = msg["error"]["message"]
                        .as_str()
                        .or_else(|| msg["message"].as_str())
                        .unwrap_or("Codex reported an error");
                    return Err(AgentError::parse_error(message.to_string()).with_details(json.clone()));
                }
                _ => {}
            }
            last = Some(json);
        }

        let raw = last.ok_or_else(|| AgentError::parse_error("Codex produced no JSON events"))?;
        let text = text.ok_or_else(|| {
            AgentError::parse_error("Codex finished without an agent message").with_details(raw.clone())
        })?;
        Ok(AgentOutput {
            text,
            session_id,
            raw,
        })
    }
}

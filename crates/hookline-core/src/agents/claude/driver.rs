//! One-shot `claude -p` invocations.

use serde_json::Value;

use crate::agents::driver::{last_json_object, AgentDriver, AgentOperation, AgentOutput, SessionRef};
use crate::agents::AgentType;
use crate::error::{AgentError, AgentResult};

#[derive(Debug, Clone)]
pub struct ClaudeDriver {
    binary: String,
    model: Option<String>,
}

impl ClaudeDriver {
    pub fn new() -> Self {
        Self {
            binary: AgentType::Claude.default_binary().to_string(),
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

impl Default for ClaudeDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentDriver for ClaudeDriver {
    fn agent_type(&self) -> AgentType {
        AgentType::Claude
    }

    fn binary(&self) -> &str {
        &self.binary
    }

    fn build_args(&self, op: &AgentOperation) -> AgentResult<Vec<String>> {
        let mut args = vec!["-p".to_string(), op.prompt().to_string()];
        match op {
            AgentOperation::Generate { .. } => {}
            AgentOperation::Resume { session, .. } => match session {
                SessionRef::Latest => args.push("--continue".to_string()),
                SessionRef::Id { id } => args.extend(["--resume".to_string(), id.clone()]),
                SessionRef::Name { name } => args.extend(["--resume".to_string(), name.clone()]),
            },
            AgentOperation::Fork { from, .. } => {
                let id = from.require_concrete()?;
                args.extend([
                    "--resume".to_string(),
                    id.to_string(),
                    "--fork-session".to_string(),
                ]);
            }
        }
        args.extend(["--output-format".to_string(), "json".to_string()]);
        if let Some(ref model) = self.model {
            if !model.is_empty() {
                args.extend(["--model".to_string(), model.clone()]);
            }
        }
        Ok(args)
    }

    fn parse_output(&self, stdout: &str) -> AgentResult<AgentOutput> {
        let json = last_json_object(stdout)
            .ok_or_else(|| AgentError::parse_error("Claude produced no JSON result"))?;

        if json.get("is_error").and_then(Value::as_bool) == Some(true) {
            let message = json
                .get("result")
                .and_then(Value::as_str)
                .unwrap_or("Claude reported an error");
            return Err(AgentError::parse_error(message.to_string()).with_details(json));
        }

        let text = json
            .get("result")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AgentError::parse_error("Claude result is missing the `result` field")
                    .with_details(json.clone())
            })?
            .to_string();
        let session_id = json
            .get("session_id")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(AgentOutput {
            text,
            session_id,
            raw: json,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn generate(prompt: &str) -> AgentOperation {
        AgentOperation::Generate {
            prompt: prompt.to_string(),
        }
    }

    #[test]
    fn generate_args() {
        let args = ClaudeDriver::new().build_args(&generate("hi")).unwrap();
        assert_eq!(args, vec!["-p", "hi", "--output-format", "json"]);
    }

    #[test]
    fn resume_latest_uses_continue() {
        let op = AgentOperation::Resume {
            session: SessionRef::Latest,
            prompt: "more".to_string(),
        };
        let args = ClaudeDriver::new().with_model("opus").build_args(&op).unwrap();
        assert_eq!(
            args,
            vec!["-p", "more", "--continue", "--output-format", "json", "--model", "opus"]
        );
    }

    #[test]
    fn fork_by_id_forks_the_session() {
        let op = AgentOperation::Fork {
            from: SessionRef::id("abc"),
            prompt: "branch off".to_string(),
        };
        let args = ClaudeDriver::new().build_args(&op).unwrap();
        assert!(args.windows(3).any(|w| w == ["--resume", "abc", "--fork-session"]));
    }

    #[test]
    fn fork_from_latest_is_rejected() {
        let op = AgentOperation::Fork {
            from: SessionRef::Latest,
            prompt: "x".to_string(),
        };
        let err = ClaudeDriver::new().build_args(&op).unwrap_err();
        assert_eq!(err.code, ErrorCode::SessionInvalid);
    }

    #[test]
    fn parses_result_json() {
        let stdout = r#"{"type":"result","subtype":"success","is_error":false,"result":"4","session_id":"s-1"}"#;
        let output = ClaudeDriver::new().parse_output(stdout).unwrap();
        assert_eq!(output.text, "4");
        assert_eq!(output.session_id.as_deref(), Some("s-1"));
    }

    #[test]
    fn error_results_and_garbage_fail_to_parse() {
        let driver = ClaudeDriver::new();
        let err = driver
            .parse_output(r#"{"type":"result","is_error":true,"result":"rate limited"}"#)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ProcessOutputParseError);
        assert_eq!(err.message, "rate limited");

        let err = driver.parse_output("Segmentation fault").unwrap_err();
        assert_eq!(err.code, ErrorCode::ProcessOutputParseError);
    }
}

//! One-shot `gemini -p` invocations.

use serde_json::Value;

use crate::agents::driver::{last_json_object, AgentDriver, AgentOperation, AgentOutput, SessionRef};
use crate::agents::AgentType;
use crate::error::{AgentError, AgentResult};

#[derive(Debug, Clone)]
pub struct GeminiDriver {
    binary: String,
    model: Option<String>,
}

impl GeminiDriver {
    pub fn new() -> Self {
        Self {
            binary: AgentType::Gemini.default_binary().to_string(),
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

impl Default for GeminiDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentDriver for GeminiDriver {
    fn agent_type(&self) -> AgentType {
        AgentType::Gemini
    }

    fn binary(&self) -> &str {
        &self.binary
    }

    fn build_args(&self, op: &AgentOperation) -> AgentResult<Vec<String>> {
        let mut args = Vec::new();
        match op {
            AgentOperation::Generate { .. } => {}
            AgentOperation::Resume { session, .. } => {
                let target = match session {
                    SessionRef::Latest => "latest".to_string(),
                    SessionRef::Id { id } => id.clone(),
                    SessionRef::Name { name } => name.clone(),
                };
                args.extend(["--resume".to_string(), target]);
            }
            AgentOperation::Fork { from, .. } => {
                from.require_concrete()?;
                return Err(AgentError::session_invalid(
                    "Gemini cannot fork a session; resume it instead",
                ));
            }
        }
        args.extend([
            "-p".to_string(),
            op.prompt().to_string(),
            "--output-format".to_string(),
            "json".to_string(),
        ]);
        if let Some(ref model) = self.model {
            if !model.is_empty() {
                args.extend(["--model".to_string(), model.clone()]);
            }
        }
        Ok(args)
    }

    fn parse_output(&self, stdout: &str) -> AgentResult<AgentOutput> {
        // Pretty-printed JSON spans lines; try the whole buffer first.
        let json = serde_json::from_str::<Value>(stdout.trim())
            .ok()
            .filter(Value::is_object)
            .or_else(|| last_json_object(stdout))
            .ok_or_else(|| AgentError::parse_error("Gemini produced no JSON result"))?;

        if let Some(error) = json.get("error").filter(|e| !e.is_null()) {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Gemini reported an error")
                .to_string();
            return Err(AgentError::parse_error(message).with_details(json));
        }

        let text = json
            .get("response")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AgentError::parse_error("Gemini result is missing the `response` field")
                    .with_details(json.clone())
            })?
            .to_string();
        let session_id = json
            .get("session_id")
            .or_else(|| json.get("sessionId"))
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

    #[test]
    fn resume_latest_passes_the_keyword() {
        let op = AgentOperation::Resume {
            session: SessionRef::Latest,
            prompt: "again".to_string(),
        };
        let args = GeminiDriver::new().build_args(&op).unwrap();
        assert_eq!(
            args,
            vec!["--resume", "latest", "-p", "again", "--output-format", "json"]
        );
    }

    #[test]
    fn fork_is_rejected() {
        let op = AgentOperation::Fork {
            from: SessionRef::name("main"),
            prompt: "p".to_string(),
        };
        assert_eq!(
            GeminiDriver::new().build_args(&op).unwrap_err().code,
            ErrorCode::SessionInvalid
        );
    }

    #[test]
    fn parses_pretty_printed_output() {
        let stdout = "{\n  \"response\": \"42\",\n  \"stats\": {}\n}\n";
        let output = GeminiDriver::new().parse_output(stdout).unwrap();
        assert_eq!(output.text, "42");
        assert_eq!(output.session_id, None);
    }

    #[test]
    fn error_object_is_a_parse_error() {
        let stdout = r#"{"error": {"type": "ApiError", "message": "quota exceeded"}}"#;
        let err = GeminiDriver::new().parse_output(stdout).unwrap_err();
        assert_eq!(err.code, ErrorCode::ProcessOutputParseError);
        assert_eq!(err.message, "quota exceeded");
    }
}

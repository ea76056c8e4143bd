//! Error taxonomy shared by every fallible public operation.
//!
//! Nothing in the core panics or throws across its boundary: operations
//! return [`AgentResult`], and callers branch on [`ErrorCode`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AgentNotAvailable,
    AgentNotInitialized,
    ProcessSpawnFailed,
    ProcessTimeout,
    ProcessOutputParseError,
    SessionNotFound,
    SessionInvalid,
    UnknownError,
    ToolAlreadyRegistered,
    ToolNotFound,
    ToolExecutionFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AgentNotAvailable => "AGENT_NOT_AVAILABLE",
            ErrorCode::AgentNotInitialized => "AGENT_NOT_INITIALIZED",
            ErrorCode::ProcessSpawnFailed => "PROCESS_SPAWN_FAILED",
            ErrorCode::ProcessTimeout => "PROCESS_TIMEOUT",
            ErrorCode::ProcessOutputParseError => "PROCESS_OUTPUT_PARSE_ERROR",
            ErrorCode::SessionNotFound => "SESSION_NOT_FOUND",
            ErrorCode::SessionInvalid => "SESSION_INVALID",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
            ErrorCode::ToolAlreadyRegistered => "TOOL_ALREADY_REGISTERED",
            ErrorCode::ToolNotFound => "TOOL_NOT_FOUND",
            ErrorCode::ToolExecutionFailed => "TOOL_EXECUTION_FAILED",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure with its category, a human-readable message, and optional
/// structured context (stderr, exit code, offending id, ...).
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct AgentError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AgentError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn not_available(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AgentNotAvailable, message)
    }

    pub fn not_initialized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AgentNotInitialized, message)
    }

    pub fn spawn_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProcessSpawnFailed, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProcessTimeout, message)
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProcessOutputParseError, message)
    }

    pub fn session_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SessionNotFound, message)
    }

    pub fn session_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SessionInvalid, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnknownError, message)
    }
}

/// Result alias used across the crate.
pub type AgentResult<T> = Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn codes_serialize_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::ProcessOutputParseError).unwrap();
        assert_eq!(json, "\"PROCESS_OUTPUT_PARSE_ERROR\"");
        let parsed: ErrorCode = serde_json::from_str("\"TOOL_NOT_FOUND\"").unwrap();
        assert_eq!(parsed, ErrorCode::ToolNotFound);
    }

    #[test]
    fn as_str_matches_serde_name() {
        for code in [
            ErrorCode::AgentNotAvailable,
            ErrorCode::AgentNotInitialized,
            ErrorCode::ProcessSpawnFailed,
            ErrorCode::ProcessTimeout,
            ErrorCode::ProcessOutputParseError,
            ErrorCode::SessionNotFound,
            ErrorCode::SessionInvalid,
            ErrorCode::UnknownError,
            ErrorCode::ToolAlreadyRegistered,
            ErrorCode::ToolNotFound,
            ErrorCode::ToolExecutionFailed,
        ] {
            let json = serde_json::to_value(code).unwrap();
            assert_eq!(json, code.as_str());
        }
    }

    #[test]
    fn display_includes_code_and_message() {
        let err = AgentError::timeout("claude did not exit within 100ms");
        assert_eq!(
            err.to_string(),
            "PROCESS_TIMEOUT: claude did not exit within 100ms"
        );
    }

    #[test]
    fn details_are_skipped_when_absent() {
        let err = AgentError::session_invalid("cannot fork latest");
        let json = serde_json::to_value(&err).unwrap();
        assert!(json.get("details").is_none());

        let err = err.with_details(json!({"exitCode": 2}));
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["details"]["exitCode"], 2);
        assert_eq!(json["code"], "SESSION_INVALID");
    }
}

//! Gemini `--output-format stream-json` events and terminal text.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::agents::adapter::{envelope, str_field, value_field, VendorAdapter};
use crate::agents::terminal::{PromptPattern, TerminalPatterns};
use crate::agents::AgentType;
use crate::events::{
    AgentEvent, EventPayload, EventType, OutputCompletePayload, OutputDeltaPayload,
    SessionStartPayload, SystemInfoPayload, ToolBeginPayload, ToolCompletePayload,
    ToolErrorPayload, UserInputPayload,
};

const SESSION_KEYS: &[&str] = &["session_id", "sessionId"];

static KIND_TABLE: &[(&str, EventType)] = &[
    ("init", EventType::SessionStart),
    ("message", EventType::AgentOutputDelta),
    ("user_message", EventType::UserInputComplete),
    ("tool_use", EventType::ToolBegin),
    ("tool_result", EventType::ToolComplete),
    ("tool_error", EventType::ToolError),
    ("error", EventType::SystemInfo),
    ("result", EventType::AgentOutputComplete),
];

static PATTERNS: LazyLock<TerminalPatterns> = LazyLock::new(|| TerminalPatterns {
    prompt: PromptPattern {
        header: Regex::new(r"(?m)^[ \t│╭]*\?[ \t]+(?P<tool>[A-Z][A-Za-z]*)").unwrap(),
        default_tool: "Shell",
        detail: Regex::new(r"Allow execution of:?[ \t]*'?(?P<value>[^'\n?]+)'?").unwrap(),
        confirm: Regex::new(r"(?i)Yes, allow once|Allow once").unwrap(),
    },
    tool_begin: Regex::new(r"(?m)^[ \t│]*✔[ \t]+(?P<tool>[A-Z][A-Za-z]*)[ \t]*(?P<args>[^\n│]*)")
        .unwrap(),
    tool_begin_default: "unknown",
    turn_complete: Regex::new(r"(?m)^[ \t│>]*Type your message or @path/to/file").unwrap(),
});

pub struct GeminiAdapter;

impl GeminiAdapter {
    fn kind(raw: &Value) -> Option<&str> {
        let kind = raw.get("type")?.as_str()?;
        Some(match kind {
            "message" if raw.get("role").and_then(Value::as_str) == Some("user") => "user_message",
            "tool_result" if raw.get("status").and_then(Value::as_str) == Some("error") => {
                "tool_error"
            }
            other => other,
        })
    }

    fn payload(event_type: EventType, raw: &Value) -> Option<EventPayload> {
        let tool_name = || str_field(raw, &["tool_name", "name"]).unwrap_or_else(|| "unknown".into());
        let payload = match event_type {
            EventType::SessionStart => EventPayload::SessionStart(SessionStartPayload {
                source: Some("startup".to_string()),
                model: str_field(raw, &["model"]),
            }),
            EventType::AgentOutputDelta => EventPayload::AgentOutputDelta(OutputDeltaPayload {
                text: str_field(raw, &["content"])?,
            }),
            EventType::UserInputComplete => EventPayload::UserInputComplete(UserInputPayload {
                prompt: str_field(raw, &["content"])?,
            }),
            EventType::ToolBegin => EventPayload::ToolBegin(ToolBeginPayload {
                tool_name: str_field(raw, &["tool_name", "name"])?,
                tool_input: value_field(raw, &["parameters", "args"]),
                tool_use_id: str_field(raw, &["tool_id"]),
            }),
            EventType::ToolComplete => EventPayload::ToolComplete(ToolCompletePayload {
                tool_name: tool_name(),
                tool_input: Value::Null,
                tool_response: value_field(raw, &["output"]),
                tool_use_id: str_field(raw, &["tool_id"]),
            }),
            EventType::ToolError => EventPayload::ToolError(ToolErrorPayload {
                tool_name: tool_name(),
                tool_input: Value::Null,
                error: raw
                    .get("error")
                    .and_then(|e| str_field(e, &["message"]).or_else(|| e.as_str().map(str::to_string)))
                    .unwrap_or_else(|| "Tool failed".to_string()),
                tool_use_id: str_field(raw, &["tool_id"]),
                is_interrupt: None,
            }),
            EventType::SystemInfo => EventPayload::SystemInfo(SystemInfoPayload {
                message: str_field(raw, &["message"])?,
                title: None,
                level: Some(str_field(raw, &["severity"]).unwrap_or_else(|| "error".to_string())),
            }),
            EventType::AgentOutputComplete => {
                EventPayload::AgentOutputComplete(OutputCompletePayload {
                    text: str_field(raw, &["response"]),
                    stop_hook_active: None,
                })
            }
            _ => return None,
        };
        Some(payload)
    }
}

impl VendorAdapter for GeminiAdapter {
    fn agent_type(&self) -> AgentType {
        AgentType::Gemini
    }

    fn parse(&self, raw: &Value) -> Option<AgentEvent> {
        let kind = Self::kind(raw)?;
        let (_, event_type) = KIND_TABLE.iter().find(|(k, _)| *k == kind)?;
        let payload = Self::payload(*event_type, raw)?;
        Some(envelope(AgentType::Gemini, payload, raw, SESSION_KEYS))
    }

    fn parse_terminal_output(&self, text: &str) -> Vec<AgentEvent> {
        PATTERNS.scan(AgentType::Gemini, text)
    }

    fn partial_prompt_start(&self, text: &str) -> Option<usize> {
        PATTERNS.partial_prompt_start(text)
    }
}

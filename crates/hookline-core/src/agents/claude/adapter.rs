//! Claude stream-json messages and interactive terminal text.
//!
//! Stream messages look like:
//!
//! ```json
//! {"type": "system", "subtype": "init", "session_id": "...", "model": "..."}
//! {"type": "assistant", "message": {"content": [{"type": "text", "text": "Hi"}]}}
//! {"type": "result", "subtype": "success", "result": "Done", "session_id": "..."}
//! ```
//!
//! The message kind is the top-level `type`, refined by the first content
//! block for assistant/user messages and by `subtype` for system messages.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::agents::adapter::{envelope, str_field, value_field, VendorAdapter};
use crate::agents::terminal::{PromptPattern, TerminalPatterns};
use crate::agents::AgentType;
use crate::events::{
    AgentEvent, ContextCompactPayload, EventPayload, EventType, OutputCompletePayload,
    OutputDeltaPayload, SessionStartPayload, SystemInfoPayload, ToolBeginPayload,
    ToolCompletePayload, ToolErrorPayload, UserInputPayload,
};

const SESSION_KEYS: &[&str] = &["session_id", "sessionId"];

static KIND_TABLE: &[(&str, EventType)] = &[
    ("init", EventType::SessionStart),
    ("assistant", EventType::AgentOutputDelta),
    ("tool_use", EventType::ToolBegin),
    ("tool_result", EventType::ToolComplete),
    ("tool_error", EventType::ToolError),
    ("user", EventType::UserInputComplete),
    ("result", EventType::AgentOutputComplete),
    ("compact_boundary", EventType::ContextCompact),
    ("error", EventType::SystemInfo),
];

static PATTERNS: LazyLock<TerminalPatterns> = LazyLock::new(|| TerminalPatterns {
    prompt: PromptPattern {
        header: Regex::new(
            r"(?m)^[ \t│>]*Claude (?:wants|needs) to (?:use|run|execute):?[ \t]*(?P<tool>[A-Za-z][\w-]*)",
        )
        .unwrap(),
        default_tool: "unknown",
        detail: Regex::new(
            r"(?mi)^[ \t│]*(?P<label>Command|File|Path|URL|Pattern):[ \t]*(?P<value>[^\n]+)$",
        )
        .unwrap(),
        confirm: Regex::new(r"(?i)Allow\?|Do you want to proceed\?").unwrap(),
    },
    tool_begin: Regex::new(r"(?m)^[ \t]*⏺[ \t]*(?P<tool>[A-Z][A-Za-z]+)\((?P<args>[^\n]*)\)")
        .unwrap(),
    tool_begin_default: "unknown",
    turn_complete: Regex::new(r"(?m)^[ \t]*✻[ \t]*\w+ for \d+[hms](?:[ \t]*\d+[hms])*").unwrap(),
});

pub struct ClaudeAdapter;

impl ClaudeAdapter {
    fn kind(raw: &Value) -> Option<&str> {
        let top = raw.get("type")?.as_str()?;
        match top {
            "system" => match raw.get("subtype").and_then(Value::as_str) {
                Some("init") => Some("init"),
                Some("compact_boundary") => Some("compact_boundary"),
                _ => None,
            },
            "assistant" => match first_block(raw).and_then(|b| b.get("type")?.as_str()) {
                Some("tool_use") => Some("tool_use"),
                Some("text") => Some("assistant"),
                _ => None,
            },
            "user" => match first_block(raw) {
                Some(block) if block.get("type").and_then(Value::as_str) == Some("tool_result") => {
                    if block.get("is_error").and_then(Value::as_bool) == Some(true) {
                        Some("tool_error")
                    } else {
                        Some("tool_result")
                    }
                }
                _ => Some("user"),
            },
            other => Some(other),
        }
    }

    fn payload(kind: EventType, raw: &Value) -> Option<EventPayload> {
        let payload = match kind {
            EventType::SessionStart => EventPayload::SessionStart(SessionStartPayload {
                source: Some("startup".to_string()),
                model: str_field(raw, &["model"]),
            }),
            EventType::AgentOutputDelta => EventPayload::AgentOutputDelta(OutputDeltaPayload {
                text: block_text(raw)?,
            }),
            EventType::ToolBegin => {
                let block = first_block(raw)?;
                EventPayload::ToolBegin(ToolBeginPayload {
                    tool_name: str_field(block, &["name"])?,
                    tool_input: value_field(block, &["input"]),
                    tool_use_id: str_field(block, &["id"]),
                })
            }
            EventType::ToolComplete => {
                let block = first_block(raw)?;
                EventPayload::ToolComplete(ToolCompletePayload {
                    tool_name: str_field(raw, &["tool_name"]).unwrap_or_else(|| "unknown".into()),
                    tool_input: Value::Null,
                    tool_response: value_field(block, &["content"]),
                    tool_use_id: str_field(block, &["tool_use_id"]),
                })
            }
            EventType::ToolError => {
                let block = first_block(raw)?;
                let error = match block.get("content") {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => "Tool failed".to_string(),
                };
                EventPayload::ToolError(ToolErrorPayload {
                    tool_name: str_field(raw, &["tool_name"]).unwrap_or_else(|| "unknown".into()),
                    tool_input: Value::Null,
                    error,
                    tool_use_id: str_field(block, &["tool_use_id"]),
                    is_interrupt: None,
                })
            }
            EventType::UserInputComplete => EventPayload::UserInputComplete(UserInputPayload {
                prompt: match raw.get("message").and_then(|m| m.get("content")) {
                    Some(Value::String(s)) => s.clone(),
                    _ => block_text(raw)?,
                },
            }),
            EventType::AgentOutputComplete => {
                EventPayload::AgentOutputComplete(OutputCompletePayload {
                    text: str_field(raw, &["result"]),
                    stop_hook_active: None,
                })
            }
            EventType::ContextCompact => EventPayload::ContextCompact(ContextCompactPayload {
                trigger: raw
                    .get("compact_metadata")
                    .and_then(|m| str_field(m, &["trigger"])),
                custom_instructions: None,
            }),
            EventType::SystemInfo => EventPayload::SystemInfo(SystemInfoPayload {
                message: str_field(raw, &["message", "error"])?,
                title: None,
                level: Some("error".to_string()),
            }),
            _ => return None,
        };
        Some(payload)
    }
}

fn first_block(raw: &Value) -> Option<&Value> {
    raw.get("message")?.get("content")?.as_array()?.first()
}

/// Concatenated text of every `text` block.
fn block_text(raw: &Value) -> Option<String> {
    let blocks = raw.get("message")?.get("content")?.as_array()?;
    let text: String = blocks
        .iter()
        .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|b| b.get("text").and_then(Value::as_str))
        .collect();
    (!text.is_empty()).then_some(text)
}

impl VendorAdapter for ClaudeAdapter {
    fn agent_type(&self) -> AgentType {
        AgentType::Claude
    }

    fn parse(&self, raw: &Value) -> Option<AgentEvent> {
        let kind = Self::kind(raw)?;
        let (_, event_type) = KIND_TABLE.iter().find(|(k, _)| *k == kind)?;
        let payload = Self::payload(*event_type, raw)?;
        Some(envelope(AgentType::Claude, payload, raw, SESSION_KEYS))
    }

    fn parse_terminal_output(&self, text: &str) -> Vec<AgentEvent> {
        PATTERNS.scan(AgentType::Claude, text)
    }

    fn partial_prompt_start(&self, text: &str) -> Option<usize> {
        PATTERNS.partial_prompt_start(text)
    }
}

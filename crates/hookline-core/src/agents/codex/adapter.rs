//! Codex protocol events and interactive terminal text.
//!
//! Events arrive either bare (`{"type": "ExecCommandBegin", ...}`) or wrapped
//! in a submission envelope (`{"id": "1", "msg": {"type": "exec_command_begin", ...}}`).
//! Kinds are accepted in PascalCase or snake_case.
//!
//! `ExecApproval` is the one kind whose event type isn't fixed by the table:
//! its `approval` field decides between `permission:approve` and
//! `permission:deny`.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Value};

use crate::agents::adapter::{envelope, str_field, value_field, VendorAdapter};
use crate::agents::terminal::{PromptPattern, TerminalPatterns};
use crate::agents::AgentType;
use crate::events::{
    AgentEvent, ContextCompactPayload, EventPayload, EventType, OutputCompletePayload,
    OutputDeltaPayload, PermissionDecisionPayload, PermissionRequestPayload, SessionEndPayload,
    SessionStartPayload, SystemInfoPayload, ToolBeginPayload, ToolCompletePayload,
    UserInputPayload,
};

const SESSION_KEYS: &[&str] = &["session_id", "thread_id", "conversation_id"];

const SHELL_TOOL: &str = "shell";
const PATCH_TOOL: &str = "apply_patch";

static KIND_TABLE: &[(&str, EventType)] = &[
    ("SessionConfigured", EventType::SessionStart),
    ("ShutdownComplete", EventType::SessionEnd),
    ("UserMessage", EventType::UserInputComplete),
    ("AgentMessageDelta", EventType::AgentOutputDelta),
    ("AgentMessage", EventType::AgentOutputComplete),
    ("TaskComplete", EventType::AgentOutputComplete),
    ("ExecCommandBegin", EventType::ToolBegin),
    ("ExecCommandEnd", EventType::ToolComplete),
    ("PatchApplyBegin", EventType::ToolBegin),
    ("PatchApplyEnd", EventType::ToolComplete),
    ("ExecApprovalRequest", EventType::PermissionRequest),
    ("ApplyPatchApprovalRequest", EventType::PermissionRequest),
    // Branches on `approval`; see `approval_type`.
    ("ExecApproval", EventType::PermissionApprove),
    ("Error", EventType::SystemInfo),
    ("StreamError", EventType::SystemInfo),
    ("BackgroundEvent", EventType::SystemInfo),
    ("ContextCompacted", EventType::ContextCompact),
];

static PATTERNS: LazyLock<TerminalPatterns> = LazyLock::new(|| TerminalPatterns {
    prompt: PromptPattern {
        header: Regex::new(
            r"(?mi)^[ \t▌│>]*(?:Would you like to run the following command\?|Shell command:?[ \t]*$)",
        )
        .unwrap(),
        default_tool: SHELL_TOOL,
        detail: Regex::new(r"(?m)^[ \t▌│]*(?P<label>\$)[ \t]*(?P<value>[^\n]+)$").unwrap(),
        confirm: Regex::new(r"(?i)Yes, proceed|Do you want to proceed\?|proceed\?[ \t]*\[y").unwrap(),
    },
    tool_begin: Regex::new(r"(?m)^[ \t]*• (?:Running|Ran)[ \t]+(?P<args>[^\n]+)").unwrap(),
    tool_begin_default: SHELL_TOOL,
    turn_complete: Regex::new(r"(?m)^[ \t─]*Worked for \d+[hms](?:[ \t]*\d+[hms])*").unwrap(),
});

/// `exec_command_begin` → `ExecCommandBegin`, `error` → `Error`.
fn normalize_kind(kind: &str) -> String {
    kind.split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Render a command given as an argv array or a string. `bash -lc <script>`
/// wrappers are unwrapped to the script.
fn command_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => {
            let argv: Vec<&str> = parts.iter().filter_map(Value::as_str).collect();
            if argv.is_empty() {
                return None;
            }
            if let [shell, flag, script] = argv.as_slice() {
                let shell = shell.rsplit('/').next().unwrap_or(*shell);
                if matches!(shell, "bash" | "sh" | "zsh") && matches!(*flag, "-lc" | "-c") {
                    return Some(script.to_string());
                }
            }
            Some(shlex::try_join(argv.iter().copied()).unwrap_or_else(|_| argv.join(" ")))
        }
        _ => None,
    }
}

/// Decide the event type for an `ExecApproval` message.
fn approval_type(msg: &Value) -> Option<EventType> {
    let approval = str_field(msg, &["approval", "decision"])?.to_ascii_lowercase();
    match approval.as_str() {
        "deny" | "denied" | "abort" | "reject" | "rejected" => Some(EventType::PermissionDeny),
        "approve" | "approved" | "allow" | "approved_for_session" => {
            Some(EventType::PermissionApprove)
        }
        _ => None,
    }
}

fn tool_response(msg: &Value) -> Value {
    json!({
        "stdout": value_field(msg, &["stdout"]),
        "stderr": value_field(msg, &["stderr"]),
        "exitCode": value_field(msg, &["exit_code"]),
        "success": value_field(msg, &["success"]),
    })
}

pub struct CodexAdapter;

impl CodexAdapter {
    fn payload(kind: &str, event_type: EventType, msg: &Value) -> Option<EventPayload> {
        let is_patch = kind.starts_with("PatchApply") || kind.starts_with("ApplyPatch");
        let tool = if is_patch { PATCH_TOOL } else { SHELL_TOOL };

        let payload = match event_type {
            EventType::SessionStart => EventPayload::SessionStart(SessionStartPayload {
                source: Some("startup".to_string()),
                model: str_field(msg, &["model"]),
            }),
            EventType::SessionEnd => EventPayload::SessionEnd(SessionEndPayload {
                reason: str_field(msg, &["reason"]),
            }),
            EventType::UserInputComplete => EventPayload::UserInputComplete(UserInputPayload {
                prompt: str_field(msg, &["message"])?,
            }),
            EventType::AgentOutputDelta => EventPayload::AgentOutputDelta(OutputDeltaPayload {
                text: str_field(msg, &["delta"])?,
            }),
            EventType::AgentOutputComplete => {
                EventPayload::AgentOutputComplete(OutputCompletePayload {
                    text: str_field(msg, &["message", "last_agent_message"]),
                    stop_hook_active: None,
                })
            }
            EventType::ToolBegin => EventPayload::ToolBegin(ToolBeginPayload {
                tool_name: tool.to_string(),
                tool_input: if is_patch {
                    json!({ "changes": value_field(msg, &["changes"]) })
                } else {
                    json!({
                        "command": msg.get("command").and_then(command_text),
                        "cwd": value_field(msg, &["cwd"]),
                    })
                },
                tool_use_id: str_field(msg, &["call_id"]),
            }),
            EventType::ToolComplete => EventPayload::ToolComplete(ToolCompletePayload {
                tool_name: tool.to_string(),
                tool_input: Value::Null,
                tool_response: tool_response(msg),
                tool_use_id: str_field(msg, &["call_id"]),
            }),
            EventType::PermissionRequest => {
                let command = msg.get("command").and_then(command_text);
                EventPayload::PermissionRequest(PermissionRequestPayload {
                    tool_name: tool.to_string(),
                    tool_input: Some(json!({
                        "command": command,
                        "cwd": value_field(msg, &["cwd"]),
                        "reason": value_field(msg, &["reason"]),
                        "changes": value_field(msg, &["changes"]),
                    })),
                    command,
                    prompt: None,
                    action_id: None,
                })
            }
            EventType::PermissionApprove | EventType::PermissionDeny => {
                let decision = PermissionDecisionPayload {
                    tool_name: Some(tool.to_string()),
                    command: msg.get("command").and_then(command_text),
                    request_id: str_field(msg, &["call_id", "id"]),
                    reason: str_field(msg, &["reason"]),
                };
                if event_type == EventType::PermissionDeny {
                    EventPayload::PermissionDeny(decision)
                } else {
                    EventPayload::PermissionApprove(decision)
                }
            }
            EventType::SystemInfo => EventPayload::SystemInfo(SystemInfoPayload {
                message: str_field(msg, &["message"])?,
                title: None,
                level: Some(
                    match kind {
                        "Error" => "error",
                        "StreamError" => "warning",
                        _ => "info",
                    }
                    .to_string(),
                ),
            }),
            EventType::ContextCompact => EventPayload::ContextCompact(ContextCompactPayload {
                trigger: Some(str_field(msg, &["trigger"]).unwrap_or_else(|| "auto".to_string())),
                custom_instructions: None,
            }),
            _ => return None,
        };
        Some(payload)
    }
}

impl VendorAdapter for CodexAdapter {
    fn agent_type(&self) -> AgentType {
        AgentType::Codex
    }

    fn parse(&self, raw: &Value) -> Option<AgentEvent> {
        let msg = match raw.get("msg") {
            Some(inner) if inner.is_object() => inner,
            _ => raw,
        };
        let kind = normalize_kind(msg.get("type")?.as_str()?);
        let (_, mapped) = KIND_TABLE.iter().find(|(k, _)| *k == kind)?;

        let event_type = if kind == "ExecApproval" {
            approval_type(msg)?
        } else {
            *mapped
        };

        let payload = Self::payload(&kind, event_type, msg)?;
        let mut event = envelope(AgentType::Codex, payload, raw, SESSION_KEYS);
        if event.session_id.is_none() {
            event.session_id = str_field(msg, SESSION_KEYS);
        }
        Some(event)
    }

    fn parse_terminal_output(&self, text: &str) -> Vec<AgentEvent> {
        PATTERNS.scan(AgentType::Codex, text)
    }

    fn partial_prompt_start(&self, text: &str) -> Option<usize> {
        PATTERNS.partial_prompt_start(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod stream {
        use super::*;

        #[test]
        fn exec_approval_deny_maps_to_permission_deny() {
            let event = CodexAdapter
                .parse(&json!({"type": "ExecApproval", "approval": "deny"}))
                .unwrap();
            assert_eq!(event.event_type(), EventType::PermissionDeny);
            assert!(matches!(event.payload, EventPayload::PermissionDeny(_)));
        }

        #[test]
        fn exec_approval_approve_maps_to_permission_approve() {
            let event = CodexAdapter
                .parse(&json!({"type": "ExecApproval", "approval": "approve", "call_id": "c1"}))
                .unwrap();
            match event.payload {
                EventPayload::PermissionApprove(p) => assert_eq!(p.request_id.as_deref(), Some("c1")),
                other => panic!("unexpected {other:?}"),
            }
        }

        #[test]
        fn exec_approval_without_a_decision_is_ignored() {
            assert!(CodexAdapter.parse(&json!({"type": "ExecApproval"})).is_none());
            assert!(CodexAdapter
                .parse(&json!({"type": "ExecApproval", "approval": "maybe"}))
                .is_none());
        }

        #[test]
        fn wrapped_snake_case_events_are_accepted() {
            let raw = json!({
                "id": "0",
                "msg": {
                    "type": "exec_command_begin",
                    "call_id": "call_1",
                    "command": ["bash", "-lc", "ls -la"],
                    "cwd": "/repo"
                }
            });
            let event = CodexAdapter.parse(&raw).unwrap();
            assert_eq!(event.raw, raw);
            match event.payload {
                EventPayload::ToolBegin(p) => {
                    assert_eq!(p.tool_name, "shell");
                    assert_eq!(p.tool_input["command"], "ls -la");
                    assert_eq!(p.tool_use_id.as_deref(), Some("call_1"));
                }
                other => panic!("unexpected {other:?}"),
            }
        }

        #[test]
        fn approval_request_carries_the_joined_command() {
            let event = CodexAdapter
                .parse(&json!({
                    "type": "ExecApprovalRequest",
                    "command": ["git", "commit", "-m", "two words"],
                }))
                .unwrap();
            match event.payload {
                EventPayload::PermissionRequest(p) => {
                    let command = p.command.unwrap();
                    assert!(command.starts_with("git commit -m "), "{command}");
                    assert!(command.contains("two words"), "{command}");
                }
                other => panic!("unexpected {other:?}"),
            }
        }

        #[test]
        fn session_configured_carries_session_id() {
            let event = CodexAdapter
                .parse(&json!({"type": "SessionConfigured", "session_id": "abc", "model": "gpt-5"}))
                .unwrap();
            assert_eq!(event.event_type(), EventType::SessionStart);
            assert_eq!(event.session_id.as_deref(), Some("abc"));
        }

        #[test]
        fn message_timestamp_is_used_when_present() {
            let event = CodexAdapter
                .parse(&json!({
                    "type": "AgentMessageDelta",
                    "delta": "He",
                    "timestamp": "2024-05-01T12:00:00Z"
                }))
                .unwrap();
            assert_eq!(event.timestamp.to_rfc3339(), "2024-05-01T12:00:00+00:00");
        }

        #[test]
        fn unknown_or_malformed_kinds_yield_nothing() {
            for raw in [
                json!({}),
                json!({"type": "TokenCount"}),
                json!({"type": ["AgentMessage"]}),
                json!({"type": "AgentMessageDelta"}),
                json!([1, 2, 3]),
            ] {
                assert!(CodexAdapter.parse(&raw).is_none(), "parsed {raw}");
            }
        }

        #[test]
        fn normalizes_snake_case_kinds() {
            assert_eq!(normalize_kind("exec_approval_request"), "ExecApprovalRequest");
            assert_eq!(normalize_kind("AgentMessage"), "AgentMessage");
            assert_eq!(normalize_kind("error"), "Error");
        }
    }

    mod terminal {
        use super::*;

        #[test]
        fn detects_the_command_prompt() {
            let text = "Would you like to run the following command?\n\n  $ npm install\n\n› 1. Yes, proceed\n  2. No, and tell Codex what to do differently";
            let events = CodexAdapter.parse_terminal_output(text);
            assert_eq!(events.len(), 1);
            match &events[0].payload {
                EventPayload::PermissionRequest(p) => {
                    assert_eq!(p.tool_name, "shell");
                    assert_eq!(p.command.as_deref(), Some("npm install"));
                }
                other => panic!("unexpected {other:?}"),
            }
        }

        #[test]
        fn detects_running_commands() {
            let events = CodexAdapter.parse_terminal_output("• Running cargo test\n");
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].event_type(), EventType::ToolBegin);
        }
    }
}

//! Claude SDK hook callbacks.
//!
//! Claude invokes a hook at twelve fixed points, passing JSON with
//! `hook_event_name`, `session_id`, `cwd` and point-specific fields. The
//! bridge turns that input into an [`AgentEvent`], emits it on the shared
//! registry, and translates the registry's verdict into the hook's reply:
//!
//! | Registry result | `PreToolUse` reply | Any other point |
//! |---|---|---|
//! | continue | `{}` | `{}` |
//! | deny | `{"hookSpecificOutput": {"permissionDecision": "deny", ...}}` | `{"continue": false, "stopReason": ...}` |

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agents::AgentType;
use crate::events::{
    AgentEvent, ContextCompactPayload, DelegationStartPayload, DelegationStopPayload,
    EventPayload, EventRegistry, EventResult, EventType, OutputCompletePayload,
    PermissionRequestPayload, SessionEndPayload, SessionStartPayload, SystemInfoPayload,
    ToolBeginPayload, ToolCompletePayload, ToolErrorPayload, UserInputPayload,
};

/// The twelve hook points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookPoint {
    PreToolUse,
    PostToolUse,
    PostToolUseFailure,
    PermissionRequest,
    UserPromptSubmit,
    SessionStart,
    SessionEnd,
    Stop,
    SubagentStart,
    SubagentStop,
    Notification,
    PreCompact,
}

impl HookPoint {
    pub const ALL: [HookPoint; 12] = [
        HookPoint::PreToolUse,
        HookPoint::PostToolUse,
        HookPoint::PostToolUseFailure,
        HookPoint::PermissionRequest,
        HookPoint::UserPromptSubmit,
        HookPoint::SessionStart,
        HookPoint::SessionEnd,
        HookPoint::Stop,
        HookPoint::SubagentStart,
        HookPoint::SubagentStop,
        HookPoint::Notification,
        HookPoint::PreCompact,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookPoint::PreToolUse => "PreToolUse",
            HookPoint::PostToolUse => "PostToolUse",
            HookPoint::PostToolUseFailure => "PostToolUseFailure",
            HookPoint::PermissionRequest => "PermissionRequest",
            HookPoint::UserPromptSubmit => "UserPromptSubmit",
            HookPoint::SessionStart => "SessionStart",
            HookPoint::SessionEnd => "SessionEnd",
            HookPoint::Stop => "Stop",
            HookPoint::SubagentStart => "SubagentStart",
            HookPoint::SubagentStop => "SubagentStop",
            HookPoint::Notification => "Notification",
            HookPoint::PreCompact => "PreCompact",
        }
    }

    pub fn from_name(name: &str) -> Option<HookPoint> {
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }

    /// The taxonomy type this point is normalized to.
    pub fn event_type(&self) -> EventType {
        match self {
            HookPoint::PreToolUse => EventType::ToolBegin,
            HookPoint::PostToolUse => EventType::ToolComplete,
            HookPoint::PostToolUseFailure => EventType::ToolError,
            HookPoint::PermissionRequest => EventType::PermissionRequest,
            HookPoint::UserPromptSubmit => EventType::UserInputComplete,
            HookPoint::SessionStart => EventType::SessionStart,
            HookPoint::SessionEnd => EventType::SessionEnd,
            HookPoint::Stop => EventType::AgentOutputComplete,
            HookPoint::SubagentStart => EventType::DelegationStart,
            HookPoint::SubagentStop => EventType::DelegationStop,
            HookPoint::Notification => EventType::SystemInfo,
            HookPoint::PreCompact => EventType::ContextCompact,
        }
    }
}

impl std::fmt::Display for HookPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw hook input. Every field is optional; each point reads the ones it
/// needs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HookInput {
    pub hook_event_name: Option<String>,
    pub session_id: Option<String>,
    pub cwd: Option<String>,
    pub transcript_path: Option<String>,
    pub tool_name: Option<String>,
    pub tool_input: Option<Value>,
    pub tool_response: Option<Value>,
    pub tool_use_id: Option<String>,
    pub error: Option<String>,
    pub is_interrupt: Option<bool>,
    pub prompt: Option<String>,
    pub agent_id: Option<String>,
    pub agent_type: Option<String>,
    pub agent_transcript_path: Option<String>,
    pub reason: Option<String>,
    pub source: Option<String>,
    pub model: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
    pub notification_type: Option<String>,
    pub trigger: Option<String>,
    pub custom_instructions: Option<String>,
    pub stop_hook_active: Option<bool>,
}

impl HookInput {
    fn tool_name(&self) -> String {
        self.tool_name.clone().unwrap_or_else(|| "unknown".to_string())
    }

    fn tool_input(&self) -> Value {
        self.tool_input.clone().unwrap_or(Value::Null)
    }

    fn command(&self) -> Option<String> {
        self.tool_input
            .as_ref()?
            .get("command")?
            .as_str()
            .map(str::to_string)
    }

    /// Build the point-specific payload.
    fn payload(&self, point: HookPoint) -> EventPayload {
        match point {
            HookPoint::PreToolUse => EventPayload::ToolBegin(ToolBeginPayload {
                tool_name: self.tool_name(),
                tool_input: self.tool_input(),
                tool_use_id: self.tool_use_id.clone(),
            }),
            HookPoint::PostToolUse => EventPayload::ToolComplete(ToolCompletePayload {
                tool_name: self.tool_name(),
                tool_input: self.tool_input(),
                tool_response: self.tool_response.clone().unwrap_or(Value::Null),
                tool_use_id: self.tool_use_id.clone(),
            }),
            HookPoint::PostToolUseFailure => EventPayload::ToolError(ToolErrorPayload {
                tool_name: self.tool_name(),
                tool_input: self.tool_input(),
                error: self.error.clone().unwrap_or_default(),
                tool_use_id: self.tool_use_id.clone(),
                is_interrupt: self.is_interrupt,
            }),
            HookPoint::PermissionRequest => {
                EventPayload::PermissionRequest(PermissionRequestPayload {
                    tool_name: self.tool_name(),
                    command: self.command(),
                    tool_input: self.tool_input.clone(),
                    prompt: None,
                    action_id: None,
                })
            }
            HookPoint::UserPromptSubmit => EventPayload::UserInputComplete(UserInputPayload {
                prompt: self.prompt.clone().unwrap_or_default(),
            }),
            HookPoint::SessionStart => EventPayload::SessionStart(SessionStartPayload {
                source: self.source.clone(),
                model: self.model.clone(),
            }),
            HookPoint::SessionEnd => EventPayload::SessionEnd(SessionEndPayload {
                reason: self.reason.clone(),
            }),
            HookPoint::Stop => EventPayload::AgentOutputComplete(OutputCompletePayload {
                text: None,
                stop_hook_active: self.stop_hook_active,
            }),
            HookPoint::SubagentStart => EventPayload::DelegationStart(DelegationStartPayload {
                agent_id: self.agent_id.clone().unwrap_or_default(),
                agent_type: self.agent_type.clone(),
            }),
            HookPoint::SubagentStop => EventPayload::DelegationStop(DelegationStopPayload {
                agent_id: self.agent_id.clone(),
                agent_type: self.agent_type.clone(),
                transcript_path: self.agent_transcript_path.clone(),
            }),
            HookPoint::Notification => EventPayload::SystemInfo(SystemInfoPayload {
                message: self.message.clone().unwrap_or_default(),
                title: self.title.clone(),
                level: self.notification_type.clone(),
            }),
            HookPoint::PreCompact => EventPayload::ContextCompact(ContextCompactPayload {
                trigger: self.trigger.clone(),
                custom_instructions: self.custom_instructions.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookSpecificOutput {
    pub hook_event_name: String,
    pub permission_decision: String,
    pub permission_decision_reason: String,
}

/// Reply written back to the hook caller. Serializes to `{}` when empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookOutput {
    #[serde(rename = "continue", skip_serializing_if = "Option::is_none")]
    pub should_continue: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook_specific_output: Option<HookSpecificOutput>,
}

impl HookOutput {
    /// Translate a registry result for `point`.
    pub fn from_result(point: HookPoint, result: &EventResult) -> Self {
        match result {
            EventResult::Continue => Self::default(),
            EventResult::Deny { message } if point == HookPoint::PreToolUse => Self {
                hook_specific_output: Some(HookSpecificOutput {
                    hook_event_name: point.as_str().to_string(),
                    permission_decision: "deny".to_string(),
                    permission_decision_reason: message.clone(),
                }),
                ..Self::default()
            },
            EventResult::Deny { message } => Self {
                should_continue: Some(false),
                stop_reason: Some(message.clone()),
                ..Self::default()
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Default::default()))
    }
}

/// Answers hook callbacks by round-tripping them through the registry.
#[derive(Clone)]
pub struct HookBridge {
    registry: EventRegistry,
}

impl HookBridge {
    pub fn new(registry: EventRegistry) -> Self {
        Self { registry }
    }

    /// Handle raw hook input, dispatching on `hook_event_name`.
    pub async fn handle(&self, raw: &Value) -> HookOutput {
        let Some(name) = raw.get("hook_event_name").and_then(Value::as_str) else {
            log::warn!("Hook input without hook_event_name; ignoring");
            return HookOutput::default();
        };
        let Some(point) = HookPoint::from_name(name) else {
            log::warn!("Unknown hook point: {name}");
            return HookOutput::default();
        };
        self.handle_point(point, raw).await
    }

    /// Handle raw hook input for a known point.
    pub async fn handle_point(&self, point: HookPoint, raw: &Value) -> HookOutput {
        let input: HookInput = match serde_json::from_value(raw.clone()) {
            Ok(input) => input,
            Err(e) => {
                log::warn!("Malformed {point} hook input: {e}");
                return HookOutput::default();
            }
        };

        let event = AgentEvent::new(AgentType::Claude, input.payload(point))
            .with_session(input.session_id.clone())
            .with_workspace(input.cwd.clone())
            .with_raw(raw.clone());

        let result = self.registry.emit(&event).await;
        if let EventResult::Deny { ref message } = result {
            log::info!("{point} denied: {message}");
        }
        HookOutput::from_result(point, &result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    mod points {
        use super::*;

        #[test]
        fn there_are_exactly_twelve() {
            let names: std::collections::HashSet<_> =
                HookPoint::ALL.iter().map(|p| p.as_str()).collect();
            assert_eq!(names.len(), 12);
            for p in HookPoint::ALL {
                assert_eq!(HookPoint::from_name(p.as_str()), Some(p));
            }
            assert_eq!(HookPoint::from_name("PostCompact"), None);
        }

        #[test]
        fn payload_type_matches_point() {
            let input = HookInput::default();
            for p in HookPoint::ALL {
                assert_eq!(input.payload(p).event_type(), p.event_type());
            }
        }
    }

    mod output {
        use super::*;

        #[test]
        fn continue_is_empty_object() {
            for p in HookPoint::ALL {
                let out = HookOutput::from_result(p, &EventResult::Continue);
                assert_eq!(out.to_json(), json!({}));
            }
        }

        #[test]
        fn pre_tool_use_deny_uses_permission_decision() {
            let out = HookOutput::from_result(HookPoint::PreToolUse, &EventResult::deny("nope"));
            assert_eq!(
                out.to_json(),
                json!({"hookSpecificOutput": {
                    "hookEventName": "PreToolUse",
                    "permissionDecision": "deny",
                    "permissionDecisionReason": "nope"
                }})
            );
        }

        #[test]
        fn other_denies_stop_the_agent() {
            let out = HookOutput::from_result(HookPoint::UserPromptSubmit, &EventResult::deny("no"));
            assert_eq!(out.to_json(), json!({"continue": false, "stopReason": "no"}));
        }
    }

    mod bridge {
        use super::*;

        #[tokio::test]
        async fn builds_payload_from_point_fields() {
            let registry = EventRegistry::new();
            let seen = Arc::new(Mutex::new(Vec::new()));
            let sink = seen.clone();
            registry.on_all(move |event| {
                sink.lock().unwrap().push((*event).clone());
                async { EventResult::Continue }
            });

            let bridge = HookBridge::new(registry);
            let out = bridge
                .handle(&json!({
                    "hook_event_name": "PreToolUse",
                    "session_id": "sess-9",
                    "cwd": "/repo",
                    "tool_name": "Bash",
                    "tool_input": {"command": "cargo fmt"},
                    "tool_use_id": "toolu_7"
                }))
                .await;
            assert!(out.is_empty());

            let seen = seen.lock().unwrap();
            assert_eq!(seen.len(), 1);
            let event = &seen[0];
            assert_eq!(event.agent, AgentType::Claude);
            assert_eq!(event.session_id.as_deref(), Some("sess-9"));
            assert_eq!(event.workspace_path.as_deref(), Some("/repo"));
            match &event.payload {
                EventPayload::ToolBegin(p) => {
                    assert_eq!(p.tool_name, "Bash");
                    assert_eq!(p.tool_input["command"], "cargo fmt");
                    assert_eq!(p.tool_use_id.as_deref(), Some("toolu_7"));
                }
                other => panic!("unexpected {other:?}"),
            }
        }

        #[tokio::test]
        async fn registry_deny_reaches_the_hook_reply() {
            let registry = EventRegistry::new();
            registry.on(EventType::ToolBegin, |_| async {
                EventResult::deny("blocked by policy")
            });
            let bridge = HookBridge::new(registry);

            let out = bridge
                .handle(&json!({"hook_event_name": "PreToolUse", "tool_name": "Bash"}))
                .await;
            let hso = out.hook_specific_output.unwrap();
            assert_eq!(hso.permission_decision, "deny");
            assert_eq!(hso.permission_decision_reason, "blocked by policy");
        }

        #[tokio::test]
        async fn malformed_input_yields_empty_reply() {
            let registry = EventRegistry::new();
            let calls = Arc::new(Mutex::new(0));
            let counter = calls.clone();
            registry.on_all(move |_| {
                *counter.lock().unwrap() += 1;
                async { EventResult::deny("should not run") }
            });
            let bridge = HookBridge::new(registry);

            for raw in [
                json!(null),
                json!({"session_id": "s"}),
                json!({"hook_event_name": "Bogus"}),
                json!({"hook_event_name": "PreToolUse", "tool_name": 5}),
            ] {
                assert!(bridge.handle(&raw).await.is_empty(), "{raw}");
            }
            assert_eq!(*calls.lock().unwrap(), 0);
        }
    }
}

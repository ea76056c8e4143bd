//! Vendor-agnostic event envelope and the fixed event taxonomy.
//!
//! Every signal from every vendor (hook callbacks, JSON stream lines, scraped
//! terminal text) ends up as an [`AgentEvent`]. The event type is derived from
//! the payload variant, so an event can never carry a payload of the wrong
//! shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agents::AgentType;

/// Coarse grouping of event types, used for category-level subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Tool,
    Permission,
    Session,
    UserInput,
    AgentOutput,
    Delegation,
    System,
    Context,
}

/// The fixed taxonomy of normalized event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "tool:begin")]
    ToolBegin,
    #[serde(rename = "tool:complete")]
    ToolComplete,
    #[serde(rename = "tool:error")]
    ToolError,
    #[serde(rename = "permission:request")]
    PermissionRequest,
    #[serde(rename = "permission:approve")]
    PermissionApprove,
    #[serde(rename = "permission:deny")]
    PermissionDeny,
    #[serde(rename = "session:start")]
    SessionStart,
    #[serde(rename = "session:end")]
    SessionEnd,
    #[serde(rename = "user_input:complete")]
    UserInputComplete,
    #[serde(rename = "agent_output:delta")]
    AgentOutputDelta,
    #[serde(rename = "agent_output:complete")]
    AgentOutputComplete,
    #[serde(rename = "delegation:start")]
    DelegationStart,
    #[serde(rename = "delegation:stop")]
    DelegationStop,
    #[serde(rename = "system:info")]
    SystemInfo,
    #[serde(rename = "context:compact")]
    ContextCompact,
}

impl EventType {
    pub const ALL: [EventType; 15] = [
        EventType::ToolBegin,
        EventType::ToolComplete,
        EventType::ToolError,
        EventType::PermissionRequest,
        EventType::PermissionApprove,
        EventType::PermissionDeny,
        EventType::SessionStart,
        EventType::SessionEnd,
        EventType::UserInputComplete,
        EventType::AgentOutputDelta,
        EventType::AgentOutputComplete,
        EventType::DelegationStart,
        EventType::DelegationStop,
        EventType::SystemInfo,
        EventType::ContextCompact,
    ];

    /// Wire name, e.g. `tool:begin`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ToolBegin => "tool:begin",
            EventType::ToolComplete => "tool:complete",
            EventType::ToolError => "tool:error",
            EventType::PermissionRequest => "permission:request",
            EventType::PermissionApprove => "permission:approve",
            EventType::PermissionDeny => "permission:deny",
            EventType::SessionStart => "session:start",
            EventType::SessionEnd => "session:end",
            EventType::UserInputComplete => "user_input:complete",
            EventType::AgentOutputDelta => "agent_output:delta",
            EventType::AgentOutputComplete => "agent_output:complete",
            EventType::DelegationStart => "delegation:start",
            EventType::DelegationStop => "delegation:stop",
            EventType::SystemInfo => "system:info",
            EventType::ContextCompact => "context:compact",
        }
    }

    pub fn parse(name: &str) -> Option<EventType> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    pub fn category(&self) -> EventCategory {
        match self {
            EventType::ToolBegin | EventType::ToolComplete | EventType::ToolError => {
                EventCategory::Tool
            }
            EventType::PermissionRequest
            | EventType::PermissionApprove
            | EventType::PermissionDeny => EventCategory::Permission,
            EventType::SessionStart | EventType::SessionEnd => EventCategory::Session,
            EventType::UserInputComplete => EventCategory::UserInput,
            EventType::AgentOutputDelta | EventType::AgentOutputComplete => {
                EventCategory::AgentOutput
            }
            EventType::DelegationStart | EventType::DelegationStop => EventCategory::Delegation,
            EventType::SystemInfo => EventCategory::System,
            EventType::ContextCompact => EventCategory::Context,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PAYLOADS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolBeginPayload {
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCompletePayload {
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: serde_json::Value,
    #[serde(default)]
    pub tool_response: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolErrorPayload {
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: serde_json::Value,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_interrupt: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequestPayload {
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<serde_json::Value>,
    /// The prompt text as shown to the user (terminal path only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Set when the request is waiting on a human round trip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
}

/// Shared by `permission:approve` and `permission:deny`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionDecisionPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartPayload {
    /// How the session began (`startup`, `resume`, `clear`, `compact`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEndPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInputPayload {
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputDeltaPayload {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputCompletePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_hook_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationStartPayload {
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationStopPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfoPayload {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Vendor-specific severity or notification kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextCompactPayload {
    /// `manual` or `auto`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
}

/// Per-type payload. Serialized adjacently as `"type": ..., "payload": {...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum EventPayload {
    #[serde(rename = "tool:begin")]
    ToolBegin(ToolBeginPayload),
    #[serde(rename = "tool:complete")]
    ToolComplete(ToolCompletePayload),
    #[serde(rename = "tool:error")]
    ToolError(ToolErrorPayload),
    #[serde(rename = "permission:request")]
    PermissionRequest(PermissionRequestPayload),
    #[serde(rename = "permission:approve")]
    PermissionApprove(PermissionDecisionPayload),
    #[serde(rename = "permission:deny")]
    PermissionDeny(PermissionDecisionPayload),
    #[serde(rename = "session:start")]
    SessionStart(SessionStartPayload),
    #[serde(rename = "session:end")]
    SessionEnd(SessionEndPayload),
    #[serde(rename = "user_input:complete")]
    UserInputComplete(UserInputPayload),
    #[serde(rename = "agent_output:delta")]
    AgentOutputDelta(OutputDeltaPayload),
    #[serde(rename = "agent_output:complete")]
    AgentOutputComplete(OutputCompletePayload),
    #[serde(rename = "delegation:start")]
    DelegationStart(DelegationStartPayload),
    #[serde(rename = "delegation:stop")]
    DelegationStop(DelegationStopPayload),
    #[serde(rename = "system:info")]
    SystemInfo(SystemInfoPayload),
    #[serde(rename = "context:compact")]
    ContextCompact(ContextCompactPayload),
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::ToolBegin(_) => EventType::ToolBegin,
            EventPayload::ToolComplete(_) => EventType::ToolComplete,
            EventPayload::ToolError(_) => EventType::ToolError,
            EventPayload::PermissionRequest(_) => EventType::PermissionRequest,
            EventPayload::PermissionApprove(_) => EventType::PermissionApprove,
            EventPayload::PermissionDeny(_) => EventType::PermissionDeny,
            EventPayload::SessionStart(_) => EventType::SessionStart,
            EventPayload::SessionEnd(_) => EventType::SessionEnd,
            EventPayload::UserInputComplete(_) => EventType::UserInputComplete,
            EventPayload::AgentOutputDelta(_) => EventType::AgentOutputDelta,
            EventPayload::AgentOutputComplete(_) => EventType::AgentOutputComplete,
            EventPayload::DelegationStart(_) => EventType::DelegationStart,
            EventPayload::DelegationStop(_) => EventType::DelegationStop,
            EventPayload::SystemInfo(_) => EventType::SystemInfo,
            EventPayload::ContextCompact(_) => EventType::ContextCompact,
        }
    }
}

// ============================================================================
// ENVELOPE
// ============================================================================

/// A normalized event as seen by the registry, the UI, and the policy engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentEvent {
    pub id: String,
    pub agent: AgentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
    /// The vendor message this event was translated from.
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl AgentEvent {
    /// New event with a fresh id, stamped now.
    pub fn new(agent: AgentType, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            agent,
            session_id: None,
            workspace_path: None,
            terminal_id: None,
            timestamp: Utc::now(),
            payload,
            raw: serde_json::Value::Null,
        }
    }

    pub fn with_session(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn with_workspace(mut self, workspace_path: Option<String>) -> Self {
        self.workspace_path = workspace_path;
        self
    }

    pub fn with_terminal(mut self, terminal_id: impl Into<String>) -> Self {
        self.terminal_id = Some(terminal_id.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = raw;
        self
    }

    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    pub fn category(&self) -> EventCategory {
        self.event_type().category()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    mod taxonomy {
        use super::*;

        #[test]
        fn wire_names_match_serde() {
            for t in EventType::ALL {
                let json = serde_json::to_value(t).unwrap();
                assert_eq!(json, t.as_str());
            }
        }

        #[test]
        fn parse_roundtrips_every_type() {
            for t in EventType::ALL {
                assert_eq!(EventType::parse(t.as_str()), Some(t));
            }
            assert_eq!(EventType::parse("tool:started"), None);
        }

        #[test]
        fn category_is_prefix_of_wire_name() {
            for t in EventType::ALL {
                let prefix = t.as_str().split(':').next().unwrap();
                let category = serde_json::to_value(t.category()).unwrap();
                assert_eq!(category, prefix, "category mismatch for {t}");
            }
        }
    }

    mod envelope {
        use super::*;

        #[test]
        fn event_type_follows_payload() {
            let event = AgentEvent::new(
                AgentType::Codex,
                EventPayload::PermissionDeny(PermissionDecisionPayload::default()),
            );
            assert_eq!(event.event_type(), EventType::PermissionDeny);
            assert_eq!(event.category(), EventCategory::Permission);
        }

        #[test]
        fn serializes_flat_with_type_and_payload() {
            let event = AgentEvent::new(
                AgentType::Claude,
                EventPayload::ToolBegin(ToolBeginPayload {
                    tool_name: "Bash".to_string(),
                    tool_input: json!({"command": "ls"}),
                    tool_use_id: Some("toolu_1".to_string()),
                }),
            )
            .with_session(Some("sess-1".to_string()))
            .with_terminal("term-a");

            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], "tool:begin");
            assert_eq!(json["agent"], "claude");
            assert_eq!(json["sessionId"], "sess-1");
            assert_eq!(json["terminalId"], "term-a");
            assert_eq!(json["payload"]["toolName"], "Bash");
            assert_eq!(json["payload"]["toolInput"]["command"], "ls");
            assert!(json.get("workspacePath").is_none());
        }

        #[test]
        fn ids_are_unique() {
            let a = AgentEvent::new(
                AgentType::Gemini,
                EventPayload::SessionEnd(SessionEndPayload::default()),
            );
            let b = AgentEvent::new(
                AgentType::Gemini,
                EventPayload::SessionEnd(SessionEndPayload::default()),
            );
            assert_ne!(a.id, b.id);
        }

        #[test]
        fn payload_skips_absent_optionals() {
            let payload = EventPayload::PermissionRequest(PermissionRequestPayload {
                tool_name: "Bash".to_string(),
                command: Some("ls".to_string()),
                ..Default::default()
            });
            let json = serde_json::to_value(&payload).unwrap();
            assert_eq!(json["type"], "permission:request");
            assert_eq!(json["payload"], json!({"toolName": "Bash", "command": "ls"}));
        }
    }
}

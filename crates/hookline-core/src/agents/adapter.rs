//! The vendor adapter seam and the registry that dispatches to it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::claude::ClaudeAdapter;
use super::codex::CodexAdapter;
use super::gemini::GeminiAdapter;
use super::AgentType;
use crate::events::AgentEvent;

/// Translates one vendor's wire formats into [`AgentEvent`]s.
///
/// Both paths are infallible by contract: input that doesn't look like a
/// known vendor message yields no event.
pub trait VendorAdapter: Send + Sync {
    fn agent_type(&self) -> AgentType;

    /// Translate one structured vendor message (a JSON stream line).
    fn parse(&self, raw: &serde_json::Value) -> Option<AgentEvent>;

    /// Scan free terminal text for prompts, tool announcements and turn
    /// markers. Zero matches is normal.
    fn parse_terminal_output(&self, text: &str) -> Vec<AgentEvent>;

    /// Offset of a permission prompt whose confirmation line has not arrived
    /// yet, if `text` ends with one.
    fn partial_prompt_start(&self, _text: &str) -> Option<usize> {
        None
    }
}

/// Adapters keyed by vendor tag.
pub struct AdapterRegistry {
    adapters: RwLock<HashMap<AgentType, Arc<dyn VendorAdapter>>>,
}

impl AdapterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            adapters: RwLock::new(HashMap::new()),
        }
    }

    /// A registry holding the built-in Claude, Codex and Gemini adapters.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(ClaudeAdapter));
        registry.register(Arc::new(CodexAdapter));
        registry.register(Arc::new(GeminiAdapter));
        registry
    }

    /// Register an adapter under its own tag, replacing any previous one.
    pub fn register(&self, adapter: Arc<dyn VendorAdapter>) {
        let agent = adapter.agent_type();
        self.adapters.write().unwrap().insert(agent, adapter);
    }

    pub fn unregister(&self, agent: AgentType) -> Option<Arc<dyn VendorAdapter>> {
        self.adapters.write().unwrap().remove(&agent)
    }

    pub fn get(&self, agent: AgentType) -> Option<Arc<dyn VendorAdapter>> {
        self.adapters.read().unwrap().get(&agent).cloned()
    }

    pub fn has(&self, agent: AgentType) -> bool {
        self.adapters.read().unwrap().contains_key(&agent)
    }

    /// Parse with the adapter for `agent`, or `None` if there isn't one.
    pub fn parse(&self, agent: AgentType, raw: &serde_json::Value) -> Option<AgentEvent> {
        match self.get(agent) {
            Some(adapter) => adapter.parse(raw),
            None => {
                log::warn!("No adapter registered for agent type: {agent}");
                None
            }
        }
    }

    /// Scan terminal text with the adapter for `agent`, or nothing if there
    /// isn't one.
    pub fn parse_terminal_output(&self, agent: AgentType, text: &str) -> Vec<AgentEvent> {
        match self.get(agent) {
            Some(adapter) => adapter.parse_terminal_output(text),
            None => {
                log::warn!("No adapter registered for agent type: {agent}");
                Vec::new()
            }
        }
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// FIELD HELPERS (shared by the vendor adapters)
// ============================================================================

/// First string-valued field among `keys`.
pub(crate) fn str_field(raw: &serde_json::Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| raw.get(*k).and_then(|v| v.as_str()))
        .map(str::to_string)
}

/// First present, non-null field among `keys`, or `Null`.
pub(crate) fn value_field(raw: &serde_json::Value, keys: &[&str]) -> serde_json::Value {
    keys.iter()
        .find_map(|k| raw.get(*k).filter(|v| !v.is_null()))
        .cloned()
        .unwrap_or(serde_json::Value::Null)
}

/// Message timestamp: RFC 3339 string or epoch milliseconds. `None` when
/// absent or unparseable so the envelope falls back to now.
pub(crate) fn message_timestamp(raw: &serde_json::Value) -> Option<chrono::DateTime<chrono::Utc>> {
    let ts = raw.get("timestamp")?;
    if let Some(s) = ts.as_str() {
        return chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&chrono::Utc));
    }
    ts.as_i64().and_then(chrono::DateTime::from_timestamp_millis)
}

/// Wrap a payload in the common envelope: session id, timestamp and the raw
/// message preserved.
pub(crate) fn envelope(
    agent: AgentType,
    payload: crate::events::EventPayload,
    raw: &serde_json::Value,
    session_keys: &[&str],
) -> AgentEvent {
    let mut event = AgentEvent::new(agent, payload)
        .with_session(str_field(raw, session_keys))
        .with_raw(raw.clone());
    if let Some(ts) = message_timestamp(raw) {
        event = event.with_timestamp(ts);
    }
    event
}

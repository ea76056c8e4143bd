//! Active session per workspace, derived from registry traffic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::agents::AgentType;
use crate::events::{AgentEvent, EventRegistry, EventResult, EventType, Subscription};

/// The session currently running in a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSession {
    pub session_id: String,
    pub agent_type: AgentType,
    pub workspace_path: String,
    pub updated_at: DateTime<Utc>,
}

pub type SessionCallback = Arc<dyn Fn(&ActiveSession) + Send + Sync>;

#[derive(Default)]
struct Inner {
    sessions: Mutex<HashMap<String, ActiveSession>>,
    on_start: Mutex<Vec<SessionCallback>>,
    on_end: Mutex<Vec<SessionCallback>>,
    subscriptions: Mutex<Vec<Subscription>>,
    disposed: AtomicBool,
}

impl Inner {
    fn session_started(&self, event: &AgentEvent) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        let (Some(session_id), Some(workspace)) = (&event.session_id, &event.workspace_path) else {
            log::debug!("session:start without session id or workspace; ignoring");
            return;
        };
        let session = ActiveSession {
            session_id: session_id.clone(),
            agent_type: event.agent,
            workspace_path: workspace.clone(),
            updated_at: event.timestamp,
        };
        self.sessions
            .lock()
            .unwrap()
            .insert(workspace.clone(), session.clone());
        log::info!("Active {} session {session_id} in {workspace}", event.agent);

        let callbacks = self.on_start.lock().unwrap().clone();
        for cb in callbacks {
            cb(&session);
        }
    }

    fn session_ended(&self, event: &AgentEvent) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        let Some(workspace) = &event.workspace_path else {
            return;
        };
        let removed = {
            let mut sessions = self.sessions.lock().unwrap();
            match sessions.get(workspace) {
                // Only end the session that actually ended, and only for
                // the vendor that owns it.
                Some(current)
                    if current.agent_type == event.agent
                        && (event.session_id.is_none()
                            || event.session_id.as_deref() == Some(current.session_id.as_str())) =>
                {
                    sessions.remove(workspace)
                }
                _ => None,
            }
        };
        let Some(session) = removed else { return };
        log::info!("Session {} in {workspace} ended", session.session_id);

        let callbacks = self.on_end.lock().unwrap().clone();
        for cb in callbacks {
            cb(&session);
        }
    }
}

/// Tracks `session:start` / `session:end` per workspace path.
///
/// Cloning shares state; [`dispose`](Self::dispose) affects every clone.
#[derive(Clone)]
pub struct SessionProvider {
    inner: Arc<Inner>,
}

impl SessionProvider {
    /// Subscribe to session events on `registry`.
    pub fn new(registry: &EventRegistry) -> Self {
        let inner = Arc::new(Inner::default());

        let on_start = inner.clone();
        let start = registry.on(EventType::SessionStart, move |event| {
            on_start.session_started(&event);
            async { EventResult::Continue }
        });
        let on_end = inner.clone();
        let end = registry.on(EventType::SessionEnd, move |event| {
            on_end.session_ended(&event);
            async { EventResult::Continue }
        });
        inner.subscriptions.lock().unwrap().extend([start, end]);

        Self { inner }
    }

    /// The session in `workspace_path`, only if it belongs to `agent`.
    pub fn get_active_session(&self, agent: AgentType, workspace_path: &str) -> Option<ActiveSession> {
        self.inner
            .sessions
            .lock()
            .unwrap()
            .get(workspace_path)
            .filter(|s| s.agent_type == agent)
            .cloned()
    }

    pub fn active_sessions(&self) -> Vec<ActiveSession> {
        self.inner.sessions.lock().unwrap().values().cloned().collect()
    }

    pub fn on_session_start<F>(&self, callback: F)
    where
        F: Fn(&ActiveSession) + Send + Sync + 'static,
    {
        if !self.inner.disposed.load(Ordering::SeqCst) {
            self.inner.on_start.lock().unwrap().push(Arc::new(callback));
        }
    }

    /// Called with the removed session's data.
    pub fn on_session_end<F>(&self, callback: F)
    where
        F: Fn(&ActiveSession) + Send + Sync + 'static,
    {
        if !self.inner.disposed.load(Ordering::SeqCst) {
            self.inner.on_end.lock().unwrap().push(Arc::new(callback));
        }
    }

    /// Unsubscribe and clear everything. Safe to call more than once.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        for sub in self.inner.subscriptions.lock().unwrap().drain(..) {
            sub.unsubscribe();
        }
        self.inner.sessions.lock().unwrap().clear();
        self.inner.on_start.lock().unwrap().clear();
        self.inner.on_end.lock().unwrap().clear();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::claude::HookBridge;
    use crate::events::{EventPayload, SessionEndPayload, SessionStartPayload};
    use serde_json::json;

    fn start(agent: AgentType, session: &str, workspace: &str) -> AgentEvent {
        AgentEvent::new(agent, EventPayload::SessionStart(SessionStartPayload::default()))
            .with_session(Some(session.to_string()))
            .with_workspace(Some(workspace.to_string()))
    }

    fn end(agent: AgentType, session: &str, workspace: &str) -> AgentEvent {
        AgentEvent::new(agent, EventPayload::SessionEnd(SessionEndPayload::default()))
            .with_session(Some(session.to_string()))
            .with_workspace(Some(workspace.to_string()))
    }

    #[tokio::test]
    async fn start_then_end_through_the_hook_bridge() {
        let registry = EventRegistry::new();
        let provider = SessionProvider::new(&registry);
        let bridge = HookBridge::new(registry.clone());

        bridge
            .handle(&json!({
                "hook_event_name": "SessionStart",
                "session_id": "sess-1",
                "cwd": "/work/app",
                "source": "startup"
            }))
            .await;
        let active = provider.get_active_session(AgentType::Claude, "/work/app").unwrap();
        assert_eq!(active.session_id, "sess-1");

        bridge
            .handle(&json!({
                "hook_event_name": "SessionEnd",
                "session_id": "sess-1",
                "cwd": "/work/app",
                "reason": "exit"
            }))
            .await;
        assert_eq!(provider.get_active_session(AgentType::Claude, "/work/app"), None);
    }

    #[tokio::test]
    async fn other_vendors_do_not_see_the_session() {
        let registry = EventRegistry::new();
        let provider = SessionProvider::new(&registry);
        registry.emit(&start(AgentType::Codex, "c-1", "/w")).await;

        assert!(provider.get_active_session(AgentType::Codex, "/w").is_some());
        assert!(provider.get_active_session(AgentType::Claude, "/w").is_none());
        assert!(provider.get_active_session(AgentType::Codex, "/other").is_none());
    }

    #[tokio::test]
    async fn a_new_start_overwrites_the_workspace_entry() {
        let registry = EventRegistry::new();
        let provider = SessionProvider::new(&registry);
        registry.emit(&start(AgentType::Claude, "a", "/w")).await;
        registry.emit(&start(AgentType::Gemini, "b", "/w")).await;

        assert_eq!(provider.active_sessions().len(), 1);
        assert!(provider.get_active_session(AgentType::Claude, "/w").is_none());
        assert_eq!(
            provider.get_active_session(AgentType::Gemini, "/w").unwrap().session_id,
            "b"
        );

        // Ending the replaced session leaves the current one alone.
        registry.emit(&end(AgentType::Claude, "a", "/w")).await;
        assert!(provider.get_active_session(AgentType::Gemini, "/w").is_some());
    }

    #[tokio::test]
    async fn anonymous_end_from_another_vendor_is_ignored() {
        let registry = EventRegistry::new();
        let provider = SessionProvider::new(&registry);
        registry.emit(&start(AgentType::Claude, "a", "/w")).await;

        let codex_end = AgentEvent::new(
            AgentType::Codex,
            EventPayload::SessionEnd(SessionEndPayload::default()),
        )
        .with_workspace(Some("/w".to_string()));
        registry.emit(&codex_end).await;
        assert!(provider.get_active_session(AgentType::Claude, "/w").is_some());

        let claude_end = AgentEvent::new(
            AgentType::Claude,
            EventPayload::SessionEnd(SessionEndPayload::default()),
        )
        .with_workspace(Some("/w".to_string()));
        registry.emit(&claude_end).await;
        assert!(provider.get_active_session(AgentType::Claude, "/w").is_none());
    }

    #[tokio::test]
    async fn callbacks_receive_started_and_removed_sessions() {
        let registry = EventRegistry::new();
        let provider = SessionProvider::new(&registry);
        let log = Arc::new(Mutex::new(Vec::new()));

        let started = log.clone();
        provider.on_session_start(move |s| started.lock().unwrap().push(format!("start {}", s.session_id)));
        let ended = log.clone();
        provider.on_session_end(move |s| ended.lock().unwrap().push(format!("end {}", s.session_id)));

        registry.emit(&start(AgentType::Claude, "x", "/w")).await;
        registry.emit(&end(AgentType::Claude, "x", "/w")).await;
        registry.emit(&end(AgentType::Claude, "x", "/w")).await;

        assert_eq!(*log.lock().unwrap(), vec!["start x", "end x"]);
    }

    #[tokio::test]
    async fn dispose_makes_the_provider_inert() {
        let registry = EventRegistry::new();
        let provider = SessionProvider::new(&registry);
        registry.emit(&start(AgentType::Claude, "x", "/w")).await;
        assert_eq!(registry.handler_count(), 2);

        provider.dispose();
        provider.dispose();
        assert!(provider.is_disposed());
        assert_eq!(registry.handler_count(), 0);
        assert!(provider.active_sessions().is_empty());

        registry.emit(&start(AgentType::Claude, "y", "/w")).await;
        assert!(provider.get_active_session(AgentType::Claude, "/w").is_none());
    }
}

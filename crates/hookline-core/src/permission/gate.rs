//! Policy enforcement as a registry handler.

use std::sync::{Arc, Mutex};

use crate::events::{AgentEvent, EventPayload, EventRegistry, EventResult, EventType, Subscription};

use super::policy::Decision;
use super::store::PolicyStore;

/// Denies `tool:begin` and `permission:request` events the workspace's
/// policy denies. `ask` continues; the caller does the round trip.
pub struct PermissionGate {
    store: Arc<PolicyStore>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl PermissionGate {
    /// Register on `registry` and return the installed gate.
    pub fn install(registry: &EventRegistry, store: Arc<PolicyStore>) -> Arc<Self> {
        let gate = Arc::new(Self {
            store,
            subscriptions: Mutex::new(Vec::new()),
        });

        let subs = [EventType::ToolBegin, EventType::PermissionRequest].map(|event_type| {
            let store = gate.store.clone();
            registry.on(event_type, move |event| {
                let result = check(&store, &event);
                async move { result }
            })
        });
        gate.subscriptions.lock().unwrap().extend(subs);
        gate
    }

    /// What the gate would decide for `event`, without emitting it.
    pub fn decide(&self, event: &AgentEvent) -> Option<Decision> {
        self.store
            .for_workspace(event.workspace_path.as_deref())
            .evaluate_event(event)
    }

    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    pub fn uninstall(&self) {
        for sub in self.subscriptions.lock().unwrap().drain(..) {
            sub.unsubscribe();
        }
    }
}

fn check(store: &PolicyStore, event: &AgentEvent) -> EventResult {
    let policy = store.for_workspace(event.workspace_path.as_deref());
    if policy.evaluate_event(event) != Some(Decision::Deny) {
        return EventResult::Continue;
    }
    let tool = match event.payload {
        EventPayload::ToolBegin(ref p) => p.tool_name.as_str(),
        EventPayload::PermissionRequest(ref p) => p.tool_name.as_str(),
        _ => "tool",
    };
    log::info!("Permission policy denied {tool} ({})", event.agent);
    EventResult::deny(format!("{tool} is blocked by the permission policy"))
}
